//! Typed error hierarchy for taskboard.
//!
//! Three top-level enums:
//! - `BoardError`: persistence and API failures on the server side
//! - `RemoteError`: failed mutation calls seen by the client board engine
//! - `ConfigError`: invalid configuration values

use thiserror::Error;

/// Errors from the board persistence layer and HTTP API.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Board {id} not found")]
    BoardNotFound { id: i64 },

    #[error("Column {id} not found")]
    ColumnNotFound { id: i64 },

    #[error("Task {id} not found")]
    TaskNotFound { id: i64 },

    #[error("Tag {id} not found")]
    TagNotFound { id: i64 },

    #[error("Saved view {id} not found")]
    ViewNotFound { id: i64 },

    #[error("Invalid reorder of column {column_id}: {reason}")]
    InvalidReorder { column_id: i64, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl BoardError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BoardNotFound { .. }
                | Self::ColumnNotFound { .. }
                | Self::TaskNotFound { .. }
                | Self::TagNotFound { .. }
                | Self::ViewNotFound { .. }
        )
    }
}

/// Errors from a remote mutation call. The reconciler handles every variant
/// the same way (rollback + toast).
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Server responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Mutation rejected: {0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },

    #[error("Unknown log format '{0}' (expected 'pretty' or 'json')")]
    UnknownLogFormat(String),
}
