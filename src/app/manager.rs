use crate::domain::{Project, Selection, Session, Task, filter_tasks};
use crate::infra::{
    AddNoteError, ClaudeLayout, DeleteSessionError, ScanError, add_note, delete_session_dir,
    delete_session_dirs, load_all_tasks, load_session_metadata, load_tasks, scan_projects,
    scan_sessions,
};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info};

/// The lists published by the last reload. Each reload replaces both.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub sessions: Arc<[Session]>,
    pub projects: Arc<[Project]>,
}

pub type SnapshotObserver = Box<dyn FnMut(&Snapshot)>;

/// Owns the aggregated view of the tasks and projects trees.
///
/// Every mutation (delete, reload) publishes a fresh [`Snapshot`]; nothing
/// in a published snapshot is edited afterwards.
pub struct SessionManager {
    layout: ClaudeLayout,
    snapshot: Snapshot,
    selection: Selection,
    observers: Vec<SnapshotObserver>,
    last_load_error: Option<String>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("layout", &self.layout)
            .field("sessions", &self.snapshot.sessions.len())
            .field("projects", &self.snapshot.projects.len())
            .field("selection", &self.selection)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SessionManager {
    pub fn new(layout: ClaudeLayout) -> Self {
        Self {
            layout,
            snapshot: Snapshot::default(),
            selection: Selection::default(),
            observers: Vec::new(),
            last_load_error: None,
        }
    }

    pub fn layout(&self) -> &ClaudeLayout {
        &self.layout
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.snapshot.sessions
    }

    pub fn projects(&self) -> &[Project] {
        &self.snapshot.projects
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions().iter().find(|session| session.id == session_id)
    }

    /// Set when the last reload aborted and published empty lists.
    pub fn last_load_error(&self) -> Option<&str> {
        self.last_load_error.as_deref()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&Snapshot) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Rescans both trees and replaces the published lists.
    ///
    /// An enumeration failure publishes empty lists instead of a partial
    /// result; it is logged and kept in [`Self::last_load_error`].
    pub fn load_sessions(&mut self) {
        let next = match self.scan() {
            Ok(snapshot) => {
                self.last_load_error = None;
                snapshot
            }
            Err(scan_error) => {
                error!(root = %self.layout.root().display(), error = %scan_error, "failed to load sessions");
                self.last_load_error = Some(scan_error.to_string());
                Snapshot::default()
            }
        };
        debug!(
            sessions = next.sessions.len(),
            projects = next.projects.len(),
            "published sessions"
        );
        self.publish(next);
    }

    fn scan(&self) -> Result<Snapshot, ScanError> {
        let metadata = load_session_metadata(&self.layout.projects_dir());
        let sessions = scan_sessions(&self.layout.tasks_dir(), &metadata)?;
        let projects = scan_projects(&self.layout.projects_dir(), &sessions)?;
        Ok(Snapshot {
            sessions: sessions.into(),
            projects: projects.into(),
        })
    }

    fn publish(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
        self.selection.prune(&self.snapshot.sessions);
        for observer in &mut self.observers {
            observer(&self.snapshot);
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn select_project(&mut self, project_id: Option<String>) {
        self.selection
            .select_project(project_id, &self.snapshot.sessions);
    }

    pub fn select_session(&mut self, session_id: Option<String>) {
        self.selection.select_session(session_id);
    }

    pub fn selected_project(&self) -> Option<&Project> {
        let project_id = self.selection.project_id.as_deref()?;
        self.projects().iter().find(|project| project.id == project_id)
    }

    pub fn filtered_sessions(&self) -> Vec<&Session> {
        self.selection.filtered_sessions(&self.snapshot.sessions)
    }

    pub fn orphan_count(&self, age_days: u32) -> usize {
        let now = SystemTime::now();
        self.sessions()
            .iter()
            .filter(|session| session.is_orphan_at(age_days, now))
            .count()
    }

    pub fn completed_session_count(&self) -> usize {
        self.sessions()
            .iter()
            .filter(|session| session.is_all_completed())
            .count()
    }

    /// Deletes one session directory and reloads.
    pub fn delete_session(&mut self, session_id: &str) -> Result<(), DeleteSessionError> {
        delete_session_dir(&self.layout, session_id)?;
        info!(session = session_id, "deleted session");
        self.load_sessions();
        Ok(())
    }

    /// Deletes every session that is an orphan right now. Returns how many
    /// were removed; failures are logged and skipped.
    pub fn delete_orphan_sessions(&mut self, age_days: u32) -> usize {
        let now = SystemTime::now();
        self.delete_matching(|session| session.is_orphan_at(age_days, now))
    }

    pub fn delete_completed_sessions(&mut self) -> usize {
        self.delete_matching(Session::is_all_completed)
    }

    /// Ids of the sessions `delete_orphan_sessions` would remove.
    pub fn orphan_session_ids(&self, age_days: u32) -> Vec<String> {
        let now = SystemTime::now();
        self.matching_ids(|session| session.is_orphan_at(age_days, now))
    }

    pub fn completed_session_ids(&self) -> Vec<String> {
        self.matching_ids(Session::is_all_completed)
    }

    fn matching_ids(&self, predicate: impl Fn(&Session) -> bool) -> Vec<String> {
        self.sessions()
            .iter()
            .filter(|&session| predicate(session))
            .map(|session| session.id.clone())
            .collect()
    }

    fn delete_matching(&mut self, predicate: impl Fn(&Session) -> bool) -> usize {
        let ids = self.matching_ids(predicate);
        if ids.is_empty() {
            return 0;
        }
        let outcome = delete_session_dirs(&self.layout, ids.iter().map(String::as_str));
        info!(
            deleted = outcome.deleted,
            failed = outcome.failed,
            "bulk session cleanup"
        );
        if outcome.deleted > 0 {
            self.load_sessions();
        }
        outcome.deleted
    }

    pub fn load_tasks(&self, session_id: &str) -> Vec<Task> {
        load_tasks(&self.layout, session_id)
    }

    pub fn load_all_tasks(&self) -> Vec<Task> {
        load_all_tasks(&self.layout)
    }

    /// Tasks for the current selection: the selected session, else every
    /// session of the selected project, else everything. Filtered by `query`.
    pub fn current_tasks(&self, query: &str) -> Vec<Task> {
        let tasks = if let Some(session_id) = self.selection.session_id.as_deref() {
            self.load_tasks(session_id)
        } else if self.selection.project_id.is_some() {
            self.filtered_sessions()
                .iter()
                .flat_map(|session| self.load_tasks(&session.id))
                .collect()
        } else {
            self.load_all_tasks()
        };
        filter_tasks(tasks, query)
    }

    /// Appends a note to one task. Does not reload.
    pub fn add_note(
        &self,
        session_id: &str,
        task_id: &str,
        note: &str,
    ) -> Result<Task, AddNoteError> {
        add_note(&self.layout, session_id, task_id, note)
    }
}
