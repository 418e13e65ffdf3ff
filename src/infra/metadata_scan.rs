use crate::domain::{
    SessionMetadata, SessionMetadataMap, SessionsIndex, decode_project_dir_name,
    overlay_sessions_index, parse_log_fragment, parse_sessions_index,
};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

pub const SESSIONS_INDEX_FILE: &str = "sessions-index.json";

const MAX_FRAGMENT_SCAN_BYTES: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProjectDirError {
    #[error("failed to list {path}: {source}")]
    List { path: String, source: io::Error },

    #[error("failed to read {path}: {source}")]
    ReadIndex { path: String, source: io::Error },

    #[error("failed to parse {path}: {source}")]
    ParseIndex {
        path: String,
        source: serde_json::Error,
    },
}

/// Names of the immediate subdirectories of `projects_dir`.
pub fn list_project_dir_names(projects_dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(projects_dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().to_string());
    }
    names.sort();
    Ok(names)
}

/// Builds the session id to metadata map from every project directory.
///
/// A directory that cannot be read contributes nothing; the rest still count.
pub fn load_session_metadata(projects_dir: &Path) -> SessionMetadataMap {
    let mut metadata = SessionMetadataMap::new();
    if !projects_dir.exists() {
        debug!(path = %projects_dir.display(), "projects directory does not exist");
        return metadata;
    }

    let dir_names = match list_project_dir_names(projects_dir) {
        Ok(names) => names,
        Err(error) => {
            warn!(path = %projects_dir.display(), %error, "failed to list projects directory");
            return metadata;
        }
    };

    for dir_name in dir_names {
        match scan_project_dir(&projects_dir.join(&dir_name), &dir_name) {
            Ok(project_metadata) => metadata.extend(project_metadata),
            Err(error) => warn!(project = %dir_name, %error, "skipping project directory"),
        }
    }

    metadata
}

fn scan_project_dir(dir: &Path, dir_name: &str) -> Result<SessionMetadataMap, ProjectDirError> {
    let project_path = decode_project_dir_name(dir_name);
    let list_error = |source| ProjectDirError::List {
        path: dir.display().to_string(),
        source,
    };

    let mut metadata = SessionMetadataMap::new();
    for entry in fs::read_dir(dir).map_err(list_error)? {
        let path = entry.map_err(list_error)?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
            continue;
        }
        let Some(session_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        let info = match read_fragment_head(&path) {
            Ok(text) => parse_log_fragment(&text),
            Err(error) => {
                debug!(path = %path.display(), %error, "unreadable session log");
                Default::default()
            }
        };
        metadata.insert(
            session_id.to_string(),
            SessionMetadata {
                custom_title: info.custom_title,
                slug: info.slug,
                project: Some(project_path.clone()),
                git_branch: None,
            },
        );
    }

    let index_path = dir.join(SESSIONS_INDEX_FILE);
    if index_path.is_file() {
        match read_sessions_index(&index_path) {
            Ok(index) => overlay_sessions_index(&mut metadata, index),
            Err(error) => warn!(%error, "ignoring sessions index"),
        }
    }

    Ok(metadata)
}

/// The index may be mid-write by its owner; callers keep the fragment
/// metadata when this fails.
fn read_sessions_index(index_path: &Path) -> Result<SessionsIndex, ProjectDirError> {
    let text = fs::read_to_string(index_path).map_err(|source| ProjectDirError::ReadIndex {
        path: index_path.display().to_string(),
        source,
    })?;
    parse_sessions_index(&text).map_err(|source| ProjectDirError::ParseIndex {
        path: index_path.display().to_string(),
        source,
    })
}

/// Reads at most the first 64 KiB; a multi-byte character cut at the limit
/// is replaced rather than failing the whole fragment.
fn read_fragment_head(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut buf = Vec::new();
    file.take(MAX_FRAGMENT_SCAN_BYTES).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn missing_projects_dir_yields_empty_map() {
        let dir = tempdir().expect("tempdir");
        assert!(load_session_metadata(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn reads_fragments_and_overlays_index() {
        let dir = tempdir().expect("tempdir");
        let project_dir = dir.path().join("-Users-joe-app");
        fs::create_dir_all(&project_dir).expect("create");

        fs::write(
            project_dir.join("s1.jsonl"),
            concat!(
                r#"{"type":"user","slug":"brave-otter"}"#,
                "\n",
                r#"{"type":"custom-title","customTitle":"From log"}"#,
                "\n"
            ),
        )
        .expect("write s1");
        fs::write(project_dir.join("s2.jsonl"), "").expect("write s2");
        fs::write(project_dir.join("notes.txt"), "ignored").expect("write txt");
        fs::write(
            project_dir.join(SESSIONS_INDEX_FILE),
            r#"{"entries":[{"sessionId":"s2","name":"Indexed","gitBranch":"feat"},{"sessionId":"s9","name":"Nope"}]}"#,
        )
        .expect("write index");

        let metadata = load_session_metadata(dir.path());
        assert_eq!(metadata.len(), 2);

        let s1 = &metadata["s1"];
        assert_eq!(s1.custom_title.as_deref(), Some("From log"));
        assert_eq!(s1.slug.as_deref(), Some("brave-otter"));
        assert_eq!(s1.project.as_deref(), Some("/Users/joe/app"));
        assert_eq!(s1.git_branch, None);

        let s2 = &metadata["s2"];
        assert_eq!(s2.custom_title.as_deref(), Some("Indexed"));
        assert_eq!(s2.git_branch.as_deref(), Some("feat"));
    }

    #[test]
    fn unreadable_index_keeps_fragment_metadata() {
        let dir = tempdir().expect("tempdir");
        let broken = dir.path().join("-work-app");
        let healthy = dir.path().join("-healthy");
        fs::create_dir_all(&broken).expect("create broken");
        fs::create_dir_all(&healthy).expect("create healthy");

        fs::write(broken.join("a.jsonl"), r#"{"slug":"quiet-fox"}"#).expect("write a");
        fs::write(broken.join(SESSIONS_INDEX_FILE), r#"{"entries":[{"sessionId":"a""#)
            .expect("write index");
        fs::write(healthy.join("b.jsonl"), "{}\n").expect("write b");

        let metadata = load_session_metadata(dir.path());
        assert_eq!(metadata["a"].project.as_deref(), Some("/work/app"));
        assert_eq!(metadata["a"].slug.as_deref(), Some("quiet-fox"));
        assert_eq!(metadata["a"].git_branch, None);
        assert_eq!(metadata["b"].project.as_deref(), Some("/healthy"));
    }

    #[test]
    fn only_scans_the_first_64_kib() {
        let dir = tempdir().expect("tempdir");
        let project_dir = dir.path().join("-p");
        fs::create_dir_all(&project_dir).expect("create");

        let mut file = File::create(project_dir.join("s.jsonl")).expect("create log");
        let filler = format!("{{\"pad\":\"{}\"}}\n", "x".repeat(1000));
        for _ in 0..70 {
            file.write_all(filler.as_bytes()).expect("pad");
        }
        writeln!(file, r#"{{"type":"custom-title","customTitle":"Too late"}}"#).expect("title");
        drop(file);

        let metadata = load_session_metadata(dir.path());
        assert_eq!(metadata["s"].custom_title, None);
        assert_eq!(metadata["s"].project.as_deref(), Some("/p"));
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_project_directories() {
        let dir = tempdir().expect("tempdir");
        let target = tempdir().expect("target");
        fs::write(target.path().join("s.jsonl"), "{}\n").expect("write");
        std::os::unix::fs::symlink(target.path(), dir.path().join("-linked")).expect("symlink");

        assert_eq!(
            list_project_dir_names(dir.path()).expect("list"),
            vec!["-linked".to_string()]
        );
        let metadata = load_session_metadata(dir.path());
        assert_eq!(metadata["s"].project.as_deref(), Some("/linked"));
    }

    #[test]
    fn lists_only_directories() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("-b")).expect("b");
        fs::create_dir_all(dir.path().join("-a")).expect("a");
        fs::write(dir.path().join("stray.json"), "{}").expect("file");
        let names = list_project_dir_names(dir.path()).expect("list");
        assert_eq!(names, vec!["-a".to_string(), "-b".to_string()]);
    }
}
