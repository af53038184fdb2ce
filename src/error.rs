use thiserror::Error;

/// Errors raised by the persistence backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Errors surfaced to the front end.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Shown to the user as a validation message; the countdown is not created.
    #[error("Please enter a valid number for duration in hours. (got {0:?})")]
    InvalidGoalDuration(String),

    #[error("Timer name must not be empty")]
    InvalidGoalName,

    #[error("A timer named {0:?} already exists")]
    DuplicateGoal(String),

    #[error("No timer named {0:?}")]
    UnknownGoal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
