// Error taxonomy for store operations

use thiserror::Error;

/// Input rejected before any state changes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task title cannot be empty or whitespace-only")]
    EmptyTitle,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Durable storage could not be read or written. Mutations absorb this;
    /// only `TaskStore::flush` hands it back.
    #[error("persistence failed: {0:#}")]
    Persistence(eyre::Report),

    /// No user id left to hand out
    #[error("task id space exhausted")]
    IdsExhausted,
}

impl StoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Trim a title and reject it if nothing is left
pub fn validate_title(title: &str) -> std::result::Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}
