//! Tasknest error types.
//!
//! Every failure a caller can branch on gets its own variant — "job not
//! found" and "id already taken" are declared outcomes here, never caught
//! panics or stringly-typed surprises.

use chrono::NaiveDateTime;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TasknestError>;

/// All recoverable Tasknest errors. Nothing in the core is process-fatal:
/// validation errors are reported back to the caller with no state change,
/// persistence errors recover locally, notification failures are swallowed
/// before they ever reach this type.
#[derive(Debug, thiserror::Error)]
pub enum TasknestError {
    /// A list title was empty or whitespace-only.
    #[error("list title must not be empty")]
    EmptyTitle,

    /// A list with this exact title already exists.
    #[error("a list titled '{0}' already exists")]
    DuplicateTitle(String),

    /// Two distinct titles would normalize to the same reminder job id
    /// (they differ only in whitespace style).
    #[error("title '{title}' collides with existing list '{existing}' after normalization")]
    TitleCollision { title: String, existing: String },

    /// No list with this title exists.
    #[error("no list titled '{0}'")]
    UnknownList(String),

    /// A reminder was requested for a time that is not in the future.
    #[error("reminder time {0} is not in the future")]
    PastTimestamp(NaiveDateTime),

    /// Clearing a reminder on a list that has none.
    #[error("list '{0}' has no reminder set")]
    NoReminder(String),

    /// A task index was out of range for the list.
    #[error("task index {index} out of range for list '{title}' ({len} tasks)")]
    TaskIndex {
        title: String,
        index: usize,
        len: usize,
    },

    /// A task text was empty after trimming.
    #[error("task text must not be empty")]
    EmptyTask,

    /// Snapshot file could not be read or written.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot contents could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Config file problems (unreadable, unparseable).
    #[error("config error: {0}")]
    Config(String),
}

impl TasknestError {
    /// Whether this is a user-input validation error (reported to the user,
    /// no state mutated) as opposed to a storage-level failure.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            TasknestError::Io(_) | TasknestError::Serialize(_) | TasknestError::Config(_)
        )
    }
}
