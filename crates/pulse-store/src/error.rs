//! Store error types

use thiserror::Error;

/// Errors surfaced by a record store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Vote references unknown idea: {0}")]
    DanglingVote(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
