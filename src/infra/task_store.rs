use crate::domain::{Task, decode_task, encode_task_pretty, sort_tasks_by_id};
use crate::infra::{ClaudeLayout, list_task_files};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AddNoteError {
    #[error("task {task_id} not found in session {session_id}")]
    NotFound { session_id: String, task_id: String },

    #[error("failed to encode task: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write task: {0}")]
    Write(#[from] io::Error),
}

/// Tasks of one session ordered by numeric id, each tagged with the session.
/// Files that cannot be read or decoded are left out.
pub fn load_tasks(layout: &ClaudeLayout, session_id: &str) -> Vec<Task> {
    let Some(session_dir) = layout.session_dir(session_id) else {
        return Vec::new();
    };
    if !session_dir.is_dir() {
        return Vec::new();
    }

    let files = match list_task_files(&session_dir) {
        Ok(files) => files,
        Err(error) => {
            warn!(session = session_id, %error, "failed to list session tasks");
            return Vec::new();
        }
    };

    let mut tasks = Vec::with_capacity(files.len());
    for path in files {
        let Some(mut task) = read_task(&path) else {
            continue;
        };
        task.session_id = Some(session_id.to_string());
        tasks.push(task);
    }
    sort_tasks_by_id(&mut tasks);
    tasks
}

/// Tasks of every session directory, grouped by session in directory-name order.
pub fn load_all_tasks(layout: &ClaudeLayout) -> Vec<Task> {
    let tasks_dir = layout.tasks_dir();
    let entries = match fs::read_dir(&tasks_dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(error) => {
            warn!(path = %tasks_dir.display(), %error, "failed to list tasks directory");
            return Vec::new();
        }
    };

    let mut session_ids = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    session_ids.sort();

    session_ids
        .iter()
        .flat_map(|session_id| load_tasks(layout, session_id))
        .collect()
}

/// Appends a user note to one task's description and rewrites the file.
///
/// The new content goes to a sibling temp file that is renamed over the
/// original, so readers see either the old or the new task.
pub fn add_note(
    layout: &ClaudeLayout,
    session_id: &str,
    task_id: &str,
    note: &str,
) -> Result<Task, AddNoteError> {
    let not_found = || AddNoteError::NotFound {
        session_id: session_id.to_string(),
        task_id: task_id.to_string(),
    };

    let path = layout.task_file(session_id, task_id).ok_or_else(not_found)?;
    let mut task = read_task(&path).ok_or_else(not_found)?;

    task.append_note(note);
    let text = encode_task_pretty(&task)?;

    let tmp = path.with_extension("json.tmp");
    if let Err(error) = fs::write(&tmp, text) {
        let _ = fs::remove_file(&tmp);
        return Err(error.into());
    }
    if let Err(error) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(error.into());
    }

    task.session_id = Some(session_id.to_string());
    Ok(task)
}

fn read_task(path: &Path) -> Option<Task> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            debug!(path = %path.display(), %error, "skipping unreadable task file");
            return None;
        }
    };
    match decode_task(&bytes) {
        Ok(task) => Some(task),
        Err(error) => {
            debug!(path = %path.display(), %error, "skipping undecodable task file");
            None
        }
    }
}
