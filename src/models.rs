// Data models for the task list

use serde::{Deserialize, Serialize};

/// Ids at or above this value belong to user-created tasks; below it, to the built-in samples.
pub const USER_ID_THRESHOLD: i64 = 1001;

/// A single todo entry
///
/// Serialized with camelCase field names so the persisted slot keeps the
/// `createdAt` / `completedAt` layout consumers already read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub completed: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl Task {
    pub fn new(id: i64, title: impl Into<String>, created_at: i64) -> Self {
        Self {
            id,
            title: title.into(),
            completed: false,
            created_at,
            completed_at: None,
        }
    }

    /// Whether this is one of the built-in sample tasks
    pub fn is_sample(&self) -> bool {
        is_sample_id(self.id)
    }

    /// Flip the completion flag, stamping or clearing `completed_at`
    pub fn toggle(&mut self, now: i64) {
        self.completed = !self.completed;
        self.completed_at = if self.completed { Some(now) } else { None };
    }
}

pub fn is_sample_id(id: i64) -> bool {
    id < USER_ID_THRESHOLD
}

/// The fixed set of sample tasks every store starts with
pub fn sample_tasks(created_at: i64) -> Vec<Task> {
    ["Learn Angular", "Build a TODO App", "Master RxJS"]
        .iter()
        .enumerate()
        .map(|(i, title)| Task::new(i as i64 + 1, *title, created_at))
        .collect()
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
