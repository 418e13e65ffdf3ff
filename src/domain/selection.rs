use crate::domain::{Session, decode_project_dir_name};

/// Which project and session the user is looking at.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Selection {
    pub project_id: Option<String>,
    pub session_id: Option<String>,
}

impl Selection {
    /// Sessions visible under the selected project, or all of them.
    /// The project id is the encoded directory name, so it is decoded here
    /// rather than looked up.
    pub fn filtered_sessions<'a>(&self, sessions: &'a [Session]) -> Vec<&'a Session> {
        let Some(project_id) = self.project_id.as_deref() else {
            return sessions.iter().collect();
        };
        let path = decode_project_dir_name(project_id);
        sessions
            .iter()
            .filter(|session| session.project.as_deref() == Some(path.as_str()))
            .collect()
    }

    pub fn select_project(&mut self, project_id: Option<String>, sessions: &[Session]) {
        self.project_id = project_id;
        self.prune(sessions);
    }

    pub fn select_session(&mut self, session_id: Option<String>) {
        self.session_id = session_id;
    }

    /// Drops a session selection that the current filter no longer shows.
    pub fn prune(&mut self, sessions: &[Session]) {
        let Some(session_id) = self.session_id.as_deref() else {
            return;
        };
        let visible = self
            .filtered_sessions(sessions)
            .iter()
            .any(|session| session.id == session_id);
        if !visible {
            self.session_id = None;
        }
    }
}
