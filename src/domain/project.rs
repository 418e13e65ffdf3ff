use crate::domain::Session;
use std::time::SystemTime;

/// A directory under `projects/` with at least one session in `tasks/`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Project {
    pub id: String,
    pub path: String,
    pub sessions: Vec<Session>,
}

impl Project {
    pub fn display_name(&self) -> String {
        self.path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(self.path.as_str())
            .to_string()
    }

    pub fn total_task_count(&self) -> usize {
        self.sessions.iter().map(|session| session.task_count).sum()
    }

    pub fn active_task_count(&self) -> usize {
        self.sessions.iter().map(|session| session.in_progress).sum()
    }

    pub fn has_active_tasks(&self) -> bool {
        self.sessions.iter().any(Session::has_active_tasks)
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.sessions.iter().map(|session| session.modified_at).max()
    }
}

/// Turns a projects-tree directory name back into an absolute path.
///
/// `-Users-joe-app` becomes `/Users/joe/app`. A dash that was part of a real
/// path segment comes back as a separator; the encoding cannot tell them apart.
pub fn decode_project_dir_name(encoded: &str) -> String {
    let replaced = encoded.replace('-', "/");
    format!("/{}", replaced.trim_matches('/'))
}

/// Builds one project per directory name that owns at least one session,
/// newest first. Projects whose sessions have no timestamp sort last.
pub fn index_projects<I, S>(project_dir_names: I, sessions: &[Session]) -> Vec<Project>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut projects: Vec<Project> = project_dir_names
        .into_iter()
        .filter_map(|dir_name| {
            let id: String = dir_name.into();
            let path = decode_project_dir_name(&id);
            let project_sessions = sessions
                .iter()
                .filter(|session| session.project.as_deref() == Some(path.as_str()))
                .cloned()
                .collect::<Vec<_>>();
            if project_sessions.is_empty() {
                return None;
            }
            Some(Project {
                id,
                path,
                sessions: project_sessions,
            })
        })
        .collect();

    projects.sort_by(|a, b| {
        b.last_modified()
            .cmp(&a.last_modified())
            .then_with(|| a.id.cmp(&b.id))
    });
    projects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_session;
    use std::time::Duration;

    fn session_in(id: &str, project: &str, task_count: usize, in_progress: usize) -> Session {
        let mut session = test_session(id);
        session.project = Some(project.to_string());
        session.task_count = task_count;
        session.in_progress = in_progress;
        session.completed = task_count - in_progress;
        session
    }

    #[test]
    fn decodes_dash_encoded_paths() {
        assert_eq!(decode_project_dir_name("-Users-joe-app"), "/Users/joe/app");
        assert_eq!(decode_project_dir_name("Users-joe-app-"), "/Users/joe/app");
        assert_eq!(decode_project_dir_name("-tmp"), "/tmp");
    }

    #[test]
    fn literal_dashes_decode_as_separators() {
        assert_eq!(
            decode_project_dir_name("-Users-joe-my-project"),
            "/Users/joe/my/project"
        );
    }

    #[test]
    fn display_name_is_last_component() {
        let project = Project {
            id: "-Users-joe-dev-apps-glimpse".to_string(),
            path: "/Users/joe/dev/apps/glimpse".to_string(),
            sessions: Vec::new(),
        };
        assert_eq!(project.display_name(), "glimpse");

        let root = Project {
            id: "-tmp".to_string(),
            path: "/tmp".to_string(),
            sessions: Vec::new(),
        };
        assert_eq!(root.display_name(), "tmp");
    }

    #[test]
    fn rolls_up_counts() {
        let project = Project {
            id: "-p".to_string(),
            path: "/p".to_string(),
            sessions: vec![session_in("a", "/p", 5, 1), session_in("b", "/p", 3, 2)],
        };
        assert_eq!(project.total_task_count(), 8);
        assert_eq!(project.active_task_count(), 3);
        assert!(project.has_active_tasks());
    }

    #[test]
    fn empty_project_has_no_last_modified() {
        let project = Project {
            id: "-p".to_string(),
            path: "/p".to_string(),
            sessions: Vec::new(),
        };
        assert_eq!(project.total_task_count(), 0);
        assert!(!project.has_active_tasks());
        assert_eq!(project.last_modified(), None);
    }

    #[test]
    fn index_skips_projects_without_sessions_and_sorts_newest_first() {
        let now = SystemTime::now();
        let mut old = session_in("old", "/work/a", 1, 0);
        old.modified_at = now - Duration::from_secs(3600);
        let new = session_in("new", "/work/b", 2, 1);
        let projectless = Session {
            project: None,
            ..test_session("loose")
        };

        let projects = index_projects(
            ["-work-a", "-work-b", "-work-c"],
            &[old, new, projectless],
        );
        let ids = projects.iter().map(|p| p.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["-work-b", "-work-a"]);
        assert_eq!(projects[0].total_task_count(), 2);
        assert_eq!(projects[1].sessions[0].id, "old");
    }
}
