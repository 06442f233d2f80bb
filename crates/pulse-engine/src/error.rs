//! Error types for the Pulse engine.
//!
//! Every variant is surfaced to the caller as-is. Only [`EngineError::Contention`]
//! is safe to retry.

use pulse_store::StoreError;
use pulse_types::{IdeaId, IdeaStatus, TypesError, UserId};
use thiserror::Error;

/// Errors that can occur in engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Idea not found: {0}")]
    NotFound(IdeaId),

    #[error("{user_id} already voted on {idea_id}")]
    AlreadyVoted { idea_id: IdeaId, user_id: UserId },

    #[error("Vote by {user_id} on {idea_id} already has that weight")]
    NoOp { idea_id: IdeaId, user_id: UserId },

    #[error("{user_id} has no active vote on {idea_id}")]
    NoSuchVote { idea_id: IdeaId, user_id: UserId },

    #[error("Invalid transition for {idea_id}: {from} -> {to}")]
    InvalidTransition {
        idea_id: IdeaId,
        from: IdeaStatus,
        to: IdeaStatus,
    },

    #[error("Invalid merge target {idea_id}: {reason}")]
    InvalidMergeTarget { idea_id: IdeaId, reason: String },

    #[error("Score {score} is outside 0..=10")]
    OutOfRange { score: i32 },

    #[error("No responses to aggregate")]
    EmptyInput,

    #[error("Timed out waiting for lock on {key}")]
    Contention { key: String },

    #[error("{user_id} already holds {limit} votes")]
    VoteLimitReached { user_id: UserId, limit: u32 },

    #[error("Voting closed on {idea_id}: merged into {merged_into}")]
    VotingClosed { idea_id: IdeaId, merged_into: IdeaId },

    #[error("Invalid vote weight: {0}")]
    InvalidWeight(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether the caller may retry the same request with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Contention { .. })
    }
}

impl From<TypesError> for EngineError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::ScoreOutOfRange(score) => EngineError::OutOfRange { score },
            TypesError::NonPositiveWeight(value) => EngineError::InvalidWeight(value.to_string()),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
