// TodoStore - Task list state manager with durable local storage

pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod storage;
pub mod store;
pub mod views;

// Re-export main types for convenience
pub use config::{Backend, Config};
pub use error::{StoreError, ValidationError};
pub use models::{Task, USER_ID_THRESHOLD, now_ms};
pub use notify::{Broadcaster, SubscriptionId};
pub use storage::{FileStorage, MemoryStorage, SqliteStorage, Storage};
pub use store::TaskStore;
