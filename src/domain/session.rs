use std::fmt;
use std::time::{Duration, SystemTime};

pub const DEFAULT_ORPHAN_AGE_DAYS: u32 = 30;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// One directory under `tasks/`, with task counts and whatever the projects
/// tree knows about it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub id: String,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub project: Option<String>,
    pub git_branch: Option<String>,
    pub task_count: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub modified_at: SystemTime,
    pub has_matching_project: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrphanReason {
    NoMatchingProject,
    OlderThan { days: u32 },
    AllTasksCompleted,
    NoTasks,
}

impl fmt::Display for OrphanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingProject => f.write_str("No matching project"),
            Self::OlderThan { days } => write!(f, "Older than {days} days"),
            Self::AllTasksCompleted => f.write_str("All tasks completed"),
            Self::NoTasks => f.write_str("No tasks"),
        }
    }
}

impl Session {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.slug.clone())
            .unwrap_or_else(|| self.id.chars().take(8).collect())
    }

    pub fn has_active_tasks(&self) -> bool {
        self.in_progress > 0
    }

    pub fn is_all_completed(&self) -> bool {
        self.task_count > 0 && self.completed == self.task_count
    }

    pub fn is_empty(&self) -> bool {
        self.task_count == 0
    }

    pub fn days_since_modified(&self) -> u64 {
        self.days_since_modified_at(SystemTime::now())
    }

    /// Whole days elapsed; a timestamp in the future counts as zero.
    pub fn days_since_modified_at(&self, now: SystemTime) -> u64 {
        now.duration_since(self.modified_at)
            .unwrap_or(Duration::ZERO)
            .as_secs()
            / SECONDS_PER_DAY
    }

    pub fn is_orphan(&self, age_days: u32) -> bool {
        self.is_orphan_at(age_days, SystemTime::now())
    }

    pub fn is_orphan_at(&self, age_days: u32, now: SystemTime) -> bool {
        self.orphan_reason_at(age_days, now).is_some()
    }

    pub fn orphan_reason(&self, age_days: u32) -> Option<OrphanReason> {
        self.orphan_reason_at(age_days, SystemTime::now())
    }

    pub fn orphan_reason_at(&self, age_days: u32, now: SystemTime) -> Option<OrphanReason> {
        if !self.has_matching_project {
            return Some(OrphanReason::NoMatchingProject);
        }
        if self.days_since_modified_at(now) > u64::from(age_days) {
            return Some(OrphanReason::OlderThan { days: age_days });
        }
        if self.is_all_completed() {
            return Some(OrphanReason::AllTasksCompleted);
        }
        if self.is_empty() {
            return Some(OrphanReason::NoTasks);
        }
        None
    }
}

/// Most recently modified first; ties broken by id so repeated loads agree.
pub fn sort_sessions(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| {
        b.modified_at
            .cmp(&a.modified_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
pub(crate) fn test_session(id: &str) -> Session {
    Session {
        id: id.to_string(),
        name: None,
        slug: None,
        project: Some("/tmp/project".to_string()),
        git_branch: None,
        task_count: 1,
        completed: 0,
        in_progress: 1,
        pending: 0,
        modified_at: SystemTime::now(),
        has_matching_project: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(n: u64) -> Duration {
        Duration::from_secs(n * SECONDS_PER_DAY)
    }

    #[test]
    fn display_name_prefers_name_then_slug_then_id_prefix() {
        let mut session = test_session("0123456789abcdef");
        assert_eq!(session.display_name(), "01234567");
        session.slug = Some("brave-otter".to_string());
        assert_eq!(session.display_name(), "brave-otter");
        session.name = Some("Refactor parser".to_string());
        assert_eq!(session.display_name(), "Refactor parser");
    }

    #[test]
    fn short_id_is_used_whole() {
        assert_eq!(test_session("abc").display_name(), "abc");
    }

    #[test]
    fn completion_predicates() {
        let mut session = test_session("s");
        session.task_count = 2;
        session.completed = 2;
        session.in_progress = 0;
        assert!(session.is_all_completed());
        assert!(!session.has_active_tasks());

        session.task_count = 0;
        session.completed = 0;
        assert!(session.is_empty());
        assert!(!session.is_all_completed());
    }

    #[test]
    fn days_since_modified_counts_whole_days() {
        let now = SystemTime::now();
        let mut session = test_session("s");
        session.modified_at = now - days(3) - Duration::from_secs(60);
        assert_eq!(session.days_since_modified_at(now), 3);

        session.modified_at = now + days(1);
        assert_eq!(session.days_since_modified_at(now), 0);
    }

    #[test]
    fn active_session_with_project_is_not_orphan() {
        let session = test_session("s");
        assert!(!session.is_orphan(DEFAULT_ORPHAN_AGE_DAYS));
        assert_eq!(session.orphan_reason(DEFAULT_ORPHAN_AGE_DAYS), None);
    }

    #[test]
    fn orphan_reason_follows_priority_order() {
        let now = SystemTime::now();
        let mut session = test_session("s");
        session.task_count = 0;
        session.in_progress = 0;
        session.modified_at = now - days(40);
        session.has_matching_project = false;
        assert_eq!(
            session.orphan_reason_at(30, now),
            Some(OrphanReason::NoMatchingProject)
        );

        session.has_matching_project = true;
        assert_eq!(
            session.orphan_reason_at(30, now),
            Some(OrphanReason::OlderThan { days: 30 })
        );
        assert_eq!(
            session.orphan_reason_at(30, now).map(|r| r.to_string()),
            Some("Older than 30 days".to_string())
        );

        session.modified_at = now;
        session.task_count = 1;
        session.completed = 1;
        assert_eq!(
            session.orphan_reason_at(30, now),
            Some(OrphanReason::AllTasksCompleted)
        );

        session.task_count = 0;
        session.completed = 0;
        assert_eq!(session.orphan_reason_at(30, now), Some(OrphanReason::NoTasks));
        assert!(session.is_orphan_at(30, now));
    }

    #[test]
    fn age_threshold_is_exclusive() {
        let now = SystemTime::now();
        let mut session = test_session("s");
        session.modified_at = now - days(7);
        assert!(!session.is_orphan_at(7, now));
        session.modified_at = now - days(8);
        assert!(session.is_orphan_at(7, now));
    }

    #[test]
    fn sorts_newest_first_then_by_id() {
        let now = SystemTime::now();
        let mut a = test_session("a");
        let mut b = test_session("b");
        let mut c = test_session("c");
        a.modified_at = now - days(1);
        b.modified_at = now;
        c.modified_at = now - days(1);
        let mut sessions = vec![c, a, b];
        sort_sessions(&mut sessions);
        let ids = sessions.iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
