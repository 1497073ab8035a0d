//! Application-wide error types.
//!
//! Every ledger operation returns `Result<T, LedgerError>`; nothing in the
//! core panics on a caller mistake.  The API layer maps each variant to an
//! HTTP status (see `api.rs`).

use thiserror::Error;

use crate::verify::Check;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflicting status: {0}")]
    ConflictingStatus(String),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    #[error("Verification incomplete: {} check(s) failing", .0.len())]
    IncompleteVerification(Vec<Check>),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
