//! Net Promoter Score survey responses

use crate::{TypesError, TypesResult, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated 0–10 survey score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct NpsScore(u8);

impl NpsScore {
    pub const MAX: u8 = 10;

    pub fn new(score: i32) -> TypesResult<Self> {
        match u8::try_from(score) {
            Ok(s) if s <= Self::MAX => Ok(Self(s)),
            _ => Err(TypesError::ScoreOutOfRange(score)),
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Bucket for this score. 9–10 promote, 7–8 are passive, the rest detract.
    pub fn category(&self) -> NpsCategory {
        match self.0 {
            9..=10 => NpsCategory::Promoter,
            7..=8 => NpsCategory::Passive,
            _ => NpsCategory::Detractor,
        }
    }
}

impl TryFrom<i32> for NpsScore {
    type Error = TypesError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NpsScore> for i32 {
    fn from(score: NpsScore) -> Self {
        i32::from(score.0)
    }
}

/// NPS bucket of a single response
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpsCategory {
    Promoter,
    Passive,
    Detractor,
}

impl fmt::Display for NpsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NpsCategory::Promoter => write!(f, "promoter"),
            NpsCategory::Passive => write!(f, "passive"),
            NpsCategory::Detractor => write!(f, "detractor"),
        }
    }
}

/// An immutable survey response.
///
/// The category is not stored; it is always derived from the score.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpsResponse {
    pub user_id: UserId,
    pub score: NpsScore,
    /// Segment label the respondent belonged to when answering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl NpsResponse {
    pub fn new(user_id: UserId, score: NpsScore) -> Self {
        Self {
            user_id,
            score,
            segment: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn in_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }

    pub fn category(&self) -> NpsCategory {
        self.score.category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert!(NpsScore::new(0).is_ok());
        assert!(NpsScore::new(10).is_ok());
        assert_eq!(NpsScore::new(11), Err(TypesError::ScoreOutOfRange(11)));
        assert_eq!(NpsScore::new(-1), Err(TypesError::ScoreOutOfRange(-1)));
        assert_eq!(NpsScore::new(300), Err(TypesError::ScoreOutOfRange(300)));
    }

    #[test]
    fn test_category_thresholds() {
        let cat = |s| NpsScore::new(s).unwrap().category();
        assert_eq!(cat(10), NpsCategory::Promoter);
        assert_eq!(cat(9), NpsCategory::Promoter);
        assert_eq!(cat(8), NpsCategory::Passive);
        assert_eq!(cat(7), NpsCategory::Passive);
        assert_eq!(cat(6), NpsCategory::Detractor);
        assert_eq!(cat(0), NpsCategory::Detractor);
    }

    #[test]
    fn test_response_category_is_derived() {
        let response = NpsResponse::new(UserId::new("u1"), NpsScore::new(8).unwrap())
            .in_segment("Enterprise Users");
        assert_eq!(response.category(), NpsCategory::Passive);
        assert_eq!(response.segment.as_deref(), Some("Enterprise Users"));
    }

    #[test]
    fn test_score_deserialization_validates() {
        let bad: Result<NpsScore, _> = serde_json::from_str("12");
        assert!(bad.is_err());
        let ok: NpsScore = serde_json::from_str("9").unwrap();
        assert_eq!(ok.value(), 9);
    }
}
