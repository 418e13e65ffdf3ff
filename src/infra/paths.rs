use dirs::home_dir;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveClaudeDirError {
    #[error("home directory not found")]
    HomeDirNotFound,
}

pub fn resolve_claude_dir() -> Result<PathBuf, ResolveClaudeDirError> {
    if let Some(override_dir) = std::env::var_os("CLAUDE_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let Some(home) = home_dir() else {
        return Err(ResolveClaudeDirError::HomeDirNotFound);
    };

    Ok(home.join(".claude"))
}

/// The two trees under the assistant's root directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClaudeLayout {
    root: PathBuf,
}

impl ClaudeLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// Path of a session directory, or `None` when the id would leave the
    /// tasks tree.
    pub fn session_dir(&self, session_id: &str) -> Option<PathBuf> {
        if !is_plain_component(session_id) {
            return None;
        }
        Some(self.tasks_dir().join(session_id))
    }

    pub fn task_file(&self, session_id: &str, task_id: &str) -> Option<PathBuf> {
        if !is_plain_component(task_id) {
            return None;
        }
        Some(self.session_dir(session_id)?.join(format!("{task_id}.json")))
    }
}

fn is_plain_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains('/')
        && !value.contains('\\')
        && !value.contains('\0')
}
