use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::Pending, Self::InProgress, Self::Completed];

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One task file under `tasks/<session>/`.
///
/// Fields this crate does not model are kept in `extra` so that rewriting a
/// task (note-append) does not drop them.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub subject: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "activeForm", default, skip_serializing_if = "Option::is_none")]
    pub active_form: Option<String>,

    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<String>>,

    #[serde(rename = "blockedBy", default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    pub session_id: Option<String>,
}

impl Task {
    pub fn is_blocked(&self) -> bool {
        self.blocked_by
            .as_ref()
            .is_some_and(|blocked_by| !blocked_by.is_empty())
    }

    /// The in-progress phrasing, falling back to the subject.
    pub fn headline(&self) -> &str {
        match (&self.status, &self.active_form) {
            (TaskStatus::InProgress, Some(active_form)) if !active_form.trim().is_empty() => {
                active_form
            }
            _ => &self.subject,
        }
    }

    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        if self.subject.to_lowercase().contains(&needle) {
            return true;
        }
        self.description
            .as_ref()
            .is_some_and(|description| description.to_lowercase().contains(&needle))
    }

    pub fn append_note(&mut self, note: &str) {
        let mut description = self.description.take().unwrap_or_default();
        description.push_str(&format_note_block(note));
        self.description = Some(description);
    }
}

pub const NOTE_HEADING: &str = "#### [Note added by user]";

pub fn format_note_block(note: &str) -> String {
    format!("\n\n---\n\n{NOTE_HEADING}\n\n{}", note.trim())
}

pub fn decode_task(bytes: &[u8]) -> Result<Task, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub fn encode_task_pretty(task: &Task) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(task)
}

/// Orders tasks by numeric id; ids that are not numbers sort as 0. Stable.
pub fn sort_tasks_by_id(tasks: &mut [Task]) {
    tasks.sort_by_key(|task| task.id.trim().parse::<i64>().unwrap_or(0));
}

pub fn filter_tasks(tasks: Vec<Task>, query: &str) -> Vec<Task> {
    if query.trim().is_empty() {
        return tasks;
    }
    tasks
        .into_iter()
        .filter(|task| task.matches_query(query))
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskBoard {
    pub pending: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub completed: Vec<Task>,
}

impl TaskBoard {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut board = Self::default();
        for task in tasks {
            match task.status {
                TaskStatus::Pending => board.pending.push(task),
                TaskStatus::InProgress => board.in_progress.push(task),
                TaskStatus::Completed => board.completed.push(task),
            }
        }
        board
    }

    pub fn column(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Pending => &self.pending,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Completed => &self.completed,
        }
    }
}
