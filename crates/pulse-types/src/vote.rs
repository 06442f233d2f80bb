//! Votes and vote weights

use crate::{IdeaId, TypesError, TypesResult, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Weight of a single vote.
///
/// Always strictly positive. Stored as an exact decimal so that summing
/// and subtracting weights never drifts from the recorded tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct VoteWeight(Decimal);

impl VoteWeight {
    /// The default weight applied when no segment data is available
    pub const ONE: VoteWeight = VoteWeight(Decimal::ONE);

    pub fn new(value: Decimal) -> TypesResult<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(TypesError::NonPositiveWeight(value))
        }
    }

    /// Whole-unit weight such as the `2x` of a plan tier
    pub fn units(n: u32) -> TypesResult<Self> {
        Self::new(Decimal::from(n))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Default for VoteWeight {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<Decimal> for VoteWeight {
    type Error = TypesError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VoteWeight> for Decimal {
    fn from(weight: VoteWeight) -> Self {
        weight.0
    }
}

impl fmt::Display for VoteWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0.normalize())
    }
}

/// An active vote by one user on one idea
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub idea_id: IdeaId,
    pub user_id: UserId,
    pub weight: VoteWeight,
    /// When the vote was cast or last changed
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(idea_id: IdeaId, user_id: UserId, weight: VoteWeight) -> Self {
        Self {
            idea_id,
            user_id,
            weight,
            cast_at: Utc::now(),
        }
    }

    /// The same vote re-homed onto another idea, keeping its cast time
    pub fn moved_to(&self, idea_id: IdeaId, weight: VoteWeight) -> Self {
        Self {
            idea_id,
            user_id: self.user_id.clone(),
            weight,
            cast_at: self.cast_at,
        }
    }
}
