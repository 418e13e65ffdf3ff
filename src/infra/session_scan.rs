use crate::domain::{Session, SessionMetadataMap, TaskStatus, decode_task, sort_sessions};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to list {path}: {source}")]
    ListDir { path: String, source: io::Error },

    #[error("failed to stat {path}: {source}")]
    Stat { path: String, source: io::Error },
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TaskCounts {
    pub files: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
}

/// Builds the session list from `tasks_dir`, newest first.
///
/// A missing tasks directory is an empty list. Any other listing failure is
/// an error and no partial list is returned. A session directory that
/// disappears mid-scan is skipped.
pub fn scan_sessions(
    tasks_dir: &Path,
    metadata: &SessionMetadataMap,
) -> Result<Vec<Session>, ScanError> {
    if !tasks_dir.exists() {
        debug!(path = %tasks_dir.display(), "tasks directory does not exist");
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    let entries = fs::read_dir(tasks_dir).map_err(|source| list_error(tasks_dir, source))?;
    for entry in entries {
        let entry = entry.map_err(|source| list_error(tasks_dir, source))?;
        let session_dir = entry.path();
        let is_dir = match fs::metadata(&session_dir) {
            Ok(meta) => meta.is_dir(),
            Err(error) if error.kind() == io::ErrorKind::NotFound => continue,
            Err(source) => return Err(stat_error(&session_dir, source)),
        };
        if !is_dir {
            continue;
        }

        match scan_session_dir(&session_dir, metadata) {
            Ok(session) => sessions.push(session),
            Err(error) if is_vanished(&error) => {
                debug!(path = %session_dir.display(), "session directory vanished during scan");
            }
            Err(error) => return Err(error),
        }
    }

    sort_sessions(&mut sessions);
    Ok(sessions)
}

fn scan_session_dir(session_dir: &Path, metadata: &SessionMetadataMap) -> Result<Session, ScanError> {
    let id = session_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let counts = count_tasks(session_dir)?;
    let modified_at = fs::metadata(session_dir)
        .and_then(|meta| meta.modified())
        .map_err(|source| stat_error(session_dir, source))?;

    let meta = metadata.get(&id);
    Ok(Session {
        name: meta.and_then(|meta| meta.custom_title.clone()),
        slug: meta.and_then(|meta| meta.slug.clone()),
        project: meta.and_then(|meta| meta.project.clone()),
        git_branch: meta.and_then(|meta| meta.git_branch.clone()),
        task_count: counts.files,
        completed: counts.completed,
        in_progress: counts.in_progress,
        pending: counts.pending,
        modified_at,
        has_matching_project: meta.is_some(),
        id,
    })
}

/// Counts task files in one session directory.
///
/// `files` counts every `.json` file, including ones that fail to decode;
/// those are counted as pending so the status buckets always sum to `files`.
pub fn count_tasks(session_dir: &Path) -> Result<TaskCounts, ScanError> {
    let mut counts = TaskCounts::default();
    for path in list_task_files(session_dir)? {
        counts.files += 1;
        let status = match fs::read(&path) {
            Ok(bytes) => match decode_task(&bytes) {
                Ok(task) => Some(task.status),
                Err(error) => {
                    debug!(path = %path.display(), %error, "skipping undecodable task file");
                    None
                }
            },
            Err(error) => {
                debug!(path = %path.display(), %error, "skipping unreadable task file");
                None
            }
        };
        match status.unwrap_or(TaskStatus::Pending) {
            TaskStatus::Completed => counts.completed += 1,
            TaskStatus::InProgress => counts.in_progress += 1,
            TaskStatus::Pending => counts.pending += 1,
        }
    }
    Ok(counts)
}

/// Paths of the `.json` files directly inside `session_dir`, sorted by name.
pub fn list_task_files(session_dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut files = Vec::new();
    let entries = fs::read_dir(session_dir).map_err(|source| list_error(session_dir, source))?;
    for entry in entries {
        let entry = entry.map_err(|source| list_error(session_dir, source))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        if path.is_dir() {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

fn is_vanished(error: &ScanError) -> bool {
    match error {
        ScanError::ListDir { source, .. } | ScanError::Stat { source, .. } => {
            source.kind() == io::ErrorKind::NotFound
        }
    }
}

fn list_error(path: &Path, source: io::Error) -> ScanError {
    ScanError::ListDir {
        path: path.display().to_string(),
        source,
    }
}

fn stat_error(path: &Path, source: io::Error) -> ScanError {
    ScanError::Stat {
        path: path.display().to_string(),
        source,
    }
}
