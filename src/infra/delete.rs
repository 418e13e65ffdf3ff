use crate::infra::ClaudeLayout;
use std::fs;
use std::io;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DeleteSessionError {
    #[error("session folder not found: {0}")]
    NotFound(String),

    #[error("failed to delete session {session_id}: {source}")]
    Remove { session_id: String, source: io::Error },
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeleteOutcome {
    pub deleted: usize,
    pub failed: usize,
}

/// Recursively removes `tasks/<session_id>/`.
pub fn delete_session_dir(layout: &ClaudeLayout, session_id: &str) -> Result<(), DeleteSessionError> {
    let Some(session_dir) = layout.session_dir(session_id) else {
        return Err(DeleteSessionError::NotFound(session_id.to_string()));
    };
    if !session_dir.is_dir() {
        return Err(DeleteSessionError::NotFound(session_id.to_string()));
    }

    fs::remove_dir_all(&session_dir).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            DeleteSessionError::NotFound(session_id.to_string())
        } else {
            DeleteSessionError::Remove {
                session_id: session_id.to_string(),
                source,
            }
        }
    })
}

/// Deletes each session in turn; failures are logged and counted, never returned.
pub fn delete_session_dirs<'a, I>(layout: &ClaudeLayout, session_ids: I) -> DeleteOutcome
where
    I: IntoIterator<Item = &'a str>,
{
    let mut outcome = DeleteOutcome::default();
    for session_id in session_ids {
        match delete_session_dir(layout, session_id) {
            Ok(()) => outcome.deleted += 1,
            Err(error) => {
                warn!(session = session_id, %error, "failed to delete session");
                outcome.failed += 1;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn removes_session_folder_recursively() {
        let dir = tempdir().expect("tempdir");
        let layout = ClaudeLayout::new(dir.path());
        let session_dir = layout.tasks_dir().join("test-session-123");
        fs::create_dir_all(session_dir.join("nested")).expect("create");
        fs::write(session_dir.join("1.json"), "{}").expect("write");

        delete_session_dir(&layout, "test-session-123").expect("delete");
        assert!(!session_dir.exists());
    }

    #[test]
    fn missing_session_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let layout = ClaudeLayout::new(dir.path());
        let result = delete_session_dir(&layout, "non-existent");
        assert!(matches!(result, Err(DeleteSessionError::NotFound(_))));
    }

    #[test]
    fn refuses_ids_outside_tasks_dir() {
        let dir = tempdir().expect("tempdir");
        let layout = ClaudeLayout::new(dir.path());
        fs::create_dir_all(layout.tasks_dir()).expect("create");
        let result = delete_session_dir(&layout, "..");
        assert!(matches!(result, Err(DeleteSessionError::NotFound(_))));
        assert!(layout.tasks_dir().exists());
    }

    #[test]
    fn bulk_delete_continues_past_failures() {
        let dir = tempdir().expect("tempdir");
        let layout = ClaudeLayout::new(dir.path());
        fs::create_dir_all(layout.tasks_dir().join("a")).expect("a");
        fs::create_dir_all(layout.tasks_dir().join("c")).expect("c");

        let outcome = delete_session_dirs(&layout, ["a", "b", "c"]);
        assert_eq!(
            outcome,
            DeleteOutcome {
                deleted: 2,
                failed: 1
            }
        );
    }
}
