use crate::domain::{Project, Session, index_projects};
use crate::infra::{ScanError, list_project_dir_names};
use std::path::Path;

/// Groups `sessions` under the directories of `projects_dir`.
pub fn scan_projects(projects_dir: &Path, sessions: &[Session]) -> Result<Vec<Project>, ScanError> {
    if !projects_dir.exists() {
        return Ok(Vec::new());
    }
    let dir_names =
        list_project_dir_names(projects_dir).map_err(|source| ScanError::ListDir {
            path: projects_dir.display().to_string(),
            source,
        })?;
    Ok(index_projects(dir_names, sessions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_session;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_projects_dir_has_no_projects() {
        let dir = tempdir().expect("tempdir");
        let sessions = vec![test_session("s")];
        let projects = scan_projects(&dir.path().join("missing"), &sessions).expect("scan");
        assert!(projects.is_empty());
    }

    #[test]
    fn materializes_only_projects_with_sessions() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("-tmp-project")).expect("create");
        fs::create_dir_all(dir.path().join("-tmp-unused")).expect("create");

        let sessions = vec![test_session("s1"), test_session("s2")];
        let projects = scan_projects(dir.path(), &sessions).expect("scan");
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, "-tmp-project");
        assert_eq!(projects[0].path, "/tmp/project");
        assert_eq!(projects[0].sessions.len(), 2);
        assert_eq!(projects[0].total_task_count(), 2);
    }
}
