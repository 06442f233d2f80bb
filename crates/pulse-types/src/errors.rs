//! Error types for value validation in the types layer

use rust_decimal::Decimal;

/// Errors raised while constructing validated domain values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    #[error("NPS score {0} is outside 0..=10")]
    ScoreOutOfRange(i32),

    #[error("Vote weight must be positive, got {0}")]
    NonPositiveWeight(Decimal),
}

/// Result type alias for types-layer validation
pub type TypesResult<T> = Result<T, TypesError>;
