//! Repository Module
//!
//! Free-function CRUD modules per aggregate over the shared `SqlitePool`.
//! Check-then-act pairs (seat capacity, gift-card balance, webhook
//! transitions) are single conditional UPDATE statements whose affected-row
//! count is the success signal.

pub mod client;
pub mod gift_card;
pub mod order;
pub mod product;
pub mod refund_log;
pub mod reservation;
pub mod workshop;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Duplicate(db.to_string())
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
