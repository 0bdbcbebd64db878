// Read-only derived views over a task list

use crate::models::Task;
use chrono::{Local, TimeZone};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub samples: usize,
}

/// Incomplete tasks, oldest first
pub fn pending(tasks: &[Task]) -> Vec<Task> {
    let mut out: Vec<Task> = tasks.iter().filter(|t| !t.completed).cloned().collect();
    out.sort_by_key(|t| (t.created_at, t.id));
    out
}

/// Completed tasks, most recently finished first
pub fn completed(tasks: &[Task]) -> Vec<Task> {
    let mut out: Vec<Task> = tasks.iter().filter(|t| t.completed).cloned().collect();
    out.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(a.id.cmp(&b.id)));
    out
}

pub fn summary(tasks: &[Task]) -> Summary {
    let completed = tasks.iter().filter(|t| t.completed).count();
    Summary {
        total: tasks.len(),
        pending: tasks.len() - completed,
        completed,
        samples: tasks.iter().filter(|t| t.is_sample()).count(),
    }
}

/// Render a millisecond timestamp in local time, or "N/A"
pub fn format_timestamp(ms: Option<i64>) -> String {
    match ms.and_then(|ms| Local.timestamp_millis_opt(ms).single()) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "N/A".to_string(),
    }
}
