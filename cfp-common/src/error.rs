//! Common error types for the CFP portal

use thiserror::Error;

/// Common result type for CFP portal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the CFP portal services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested proposal, score, tag or user has no live record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input (self-review, missing consent, malformed fields)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A concurrent supersede won the compare-and-swap on change_id
    #[error("Stale write: {0}")]
    StaleWrite(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when SQLite rejected a statement because another writer held
    /// the lock (SQLITE_BUSY and its extended codes)
    pub fn is_busy(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db)) => db
                .code()
                .and_then(|code| code.parse::<i64>().ok())
                .map_or(false, |code| code & 0xff == 5),
            _ => false,
        }
    }
}
