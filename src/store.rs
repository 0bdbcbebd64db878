// Task list state manager: mutations, persistence and change broadcast

use crate::error::{Result, StoreError, validate_title};
use crate::models::{Task, USER_ID_THRESHOLD, is_sample_id, now_ms, sample_tasks};
use crate::notify::{Broadcaster, SubscriptionId};
use crate::storage::Storage;
use eyre::Context;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Slot key for the serialized user task list
pub const DEFAULT_KEY: &str = "user-todos";

/// Authoritative owner of the task list
///
/// Sample tasks live only in memory. User tasks are written to the storage
/// slot after every mutation and read back once when the store is opened.
/// Storage problems are logged and never fail an operation; the in-memory
/// list stays the source of truth.
pub struct TaskStore {
    sample_tasks: Vec<Task>,
    user_tasks: Vec<Task>,
    next_id: i64,
    storage: Option<Box<dyn Storage>>,
    key: String,
    updates: Broadcaster<Vec<Task>>,
}

impl TaskStore {
    /// Open a store backed by `storage`, loading any persisted user tasks
    pub fn open(storage: Box<dyn Storage>) -> Self {
        Self::open_with_key(storage, DEFAULT_KEY)
    }

    pub fn open_with_key(storage: Box<dyn Storage>, key: &str) -> Self {
        Self::build(Some(storage), key)
    }

    /// A store with no durable storage at all; reads and writes are skipped
    pub fn ephemeral() -> Self {
        Self::build(None, DEFAULT_KEY)
    }

    fn build(storage: Option<Box<dyn Storage>>, key: &str) -> Self {
        let sample_tasks = sample_tasks(now_ms());
        let mut store = Self {
            updates: Broadcaster::new(sample_tasks.clone()),
            sample_tasks,
            user_tasks: Vec::new(),
            next_id: USER_ID_THRESHOLD,
            storage,
            key: key.to_string(),
        };
        store.load();
        store
    }

    fn counter_key(&self) -> String {
        format!("{}.next_id", self.key)
    }

    /// Name of the storage backend, or "none" for an ephemeral store
    pub fn storage_name(&self) -> &'static str {
        self.storage.as_ref().map(|s| s.name()).unwrap_or("none")
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Combined view: samples first, then user tasks in insertion order
    pub fn tasks(&self) -> Vec<Task> {
        self.sample_tasks.iter().chain(self.user_tasks.iter()).cloned().collect()
    }

    pub fn sample_tasks(&self) -> &[Task] {
        &self.sample_tasks
    }

    pub fn user_tasks(&self) -> &[Task] {
        &self.user_tasks
    }

    pub fn get(&self, id: i64) -> Option<&Task> {
        self.partition(id).iter().find(|t| t.id == id)
    }

    /// Id the next `add` will assign
    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    // ========================================================================
    // Subscription
    // ========================================================================

    /// Register a listener; it is called now with the current list and again
    /// after every mutation
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Vec<Task>) + 'static,
    {
        self.updates.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.updates.unsubscribe(id)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a user task from a non-blank title
    pub fn add(&mut self, title: &str) -> Result<Task> {
        let title = validate_title(title)?;

        let following = self.next_id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        let task = Task::new(self.next_id, title, now_ms());
        self.next_id = following;
        self.user_tasks.push(task.clone());
        debug!(id = task.id, title = %task.title, "add: created user task");

        self.commit();
        Ok(task)
    }

    /// Flip completion on any task, sample or user. Returns the updated task,
    /// or `None` if no task has that id.
    pub fn toggle(&mut self, id: i64) -> Option<Task> {
        let now = now_ms();
        let toggled = self.partition_mut(id).iter_mut().find(|t| t.id == id).map(|task| {
            task.toggle(now);
            task.clone()
        });

        match &toggled {
            Some(task) => debug!(id, completed = task.completed, "toggle: flipped"),
            None => debug!(id, "toggle: no such task"),
        }

        self.commit();
        toggled
    }

    /// Retitle a user task. Sample ids are ignored and yield `Ok(None)`.
    pub fn edit(&mut self, id: i64, title: &str) -> Result<Option<Task>> {
        let title = validate_title(title)?;

        if is_sample_id(id) {
            debug!(id, "edit: ignoring sample task");
            return Ok(None);
        }

        let edited = self.user_tasks.iter_mut().find(|t| t.id == id).map(|task| {
            task.title = title;
            task.clone()
        });
        debug!(id, found = edited.is_some(), "edit: applied");

        self.commit();
        Ok(edited)
    }

    /// Remove a user task. Sample ids are ignored.
    pub fn delete(&mut self, id: i64) -> Option<Task> {
        if is_sample_id(id) {
            debug!(id, "delete: ignoring sample task");
            return None;
        }

        let removed = self
            .user_tasks
            .iter()
            .position(|t| t.id == id)
            .map(|pos| self.user_tasks.remove(pos));
        debug!(id, found = removed.is_some(), "delete: applied");

        self.commit();
        removed
    }

    /// Write the current user tasks to storage, reporting any failure.
    /// Mutations already persist on their own; this is for callers that need
    /// to know the write landed.
    pub fn flush(&mut self) -> Result<()> {
        self.persist()
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn partition(&self, id: i64) -> &[Task] {
        if is_sample_id(id) { &self.sample_tasks } else { &self.user_tasks }
    }

    fn partition_mut(&mut self, id: i64) -> &mut Vec<Task> {
        if is_sample_id(id) {
            &mut self.sample_tasks
        } else {
            &mut self.user_tasks
        }
    }

    /// Persist then broadcast; persistence failures are absorbed
    fn commit(&mut self) {
        if let Err(e) = self.persist() {
            warn!(key = %self.key, error = %e, "Failed to persist user tasks, keeping in-memory state");
        }
        let tasks = self.tasks();
        self.updates.publish(tasks);
    }

    fn persist(&mut self) -> Result<()> {
        let counter_key = self.counter_key();
        let Some(storage) = self.storage.as_mut() else {
            debug!("persist: no storage available, skipping");
            return Ok(());
        };

        let json = serde_json::to_string(&self.user_tasks)
            .context("Failed to serialize user tasks")
            .map_err(StoreError::Persistence)?;

        storage
            .write(&self.key, &json)
            .and_then(|_| storage.write(&counter_key, &self.next_id.to_string()))
            .map_err(StoreError::Persistence)?;

        debug!(key = %self.key, count = self.user_tasks.len(), next_id = self.next_id, "persist: written");
        Ok(())
    }

    /// Read persisted user tasks and the id counter; any failure leaves an
    /// empty user list
    fn load(&mut self) {
        let counter_key = self.counter_key();
        let Some(storage) = self.storage.as_ref() else {
            debug!("load: no storage available, starting empty");
            return;
        };

        let user_tasks = match storage.read(&self.key) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<Task>>(&json) {
                Ok(tasks) => sanitize(tasks),
                Err(e) => {
                    warn!(key = %self.key, error = %e, "Persisted user tasks are corrupt, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read persisted user tasks, starting empty");
                Vec::new()
            }
        };

        let stored_counter = match storage.read(&counter_key) {
            Ok(Some(raw)) => match raw.trim().parse::<i64>() {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(key = %counter_key, error = %e, "Ignoring unparsable id counter");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %counter_key, error = %e, "Failed to read id counter");
                None
            }
        };

        // sanitize() guarantees every id has a successor
        let after_max = user_tasks
            .iter()
            .filter_map(|t| t.id.checked_add(1))
            .max()
            .unwrap_or(USER_ID_THRESHOLD);
        self.next_id = stored_counter.unwrap_or(USER_ID_THRESHOLD).max(after_max).max(USER_ID_THRESHOLD);
        self.user_tasks = user_tasks;

        info!(
            backend = storage.name(),
            count = self.user_tasks.len(),
            next_id = self.next_id,
            "Loaded user tasks"
        );

        let tasks = self.tasks();
        self.updates.publish(tasks);
    }
}

/// Drop entries that would break the id partition or uniqueness
fn sanitize(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|t| {
            if is_sample_id(t.id) {
                warn!(id = t.id, "Skipping persisted task with a sample-range id");
                return false;
            }
            if t.id == i64::MAX {
                warn!(id = t.id, "Skipping persisted task whose id leaves no room for another");
                return false;
            }
            if !seen.insert(t.id) {
                warn!(id = t.id, "Skipping persisted task with a duplicate id");
                return false;
            }
            true
        })
        .collect()
}
