//! NPS aggregation.
//!
//! `nps = round((promoters - detractors) / total * 100)`, where halves round
//! toward positive infinity. The division is done in integers so the
//! result never depends on float rounding.

use std::collections::BTreeMap;

use pulse_types::{NpsCategory, NpsResponse, NpsScore};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Health band of a composite score
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpsBand {
    /// 50 and above
    Healthy,
    /// 0 to 49
    Neutral,
    /// Below 0
    AtRisk,
}

/// Composite score and bucket counts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpsSummary {
    pub nps_score: i32,
    pub promoters: u64,
    pub passives: u64,
    pub detractors: u64,
    pub total: u64,
}

impl NpsSummary {
    pub fn band(&self) -> NpsBand {
        if self.nps_score >= 50 {
            NpsBand::Healthy
        } else if self.nps_score >= 0 {
            NpsBand::Neutral
        } else {
            NpsBand::AtRisk
        }
    }
}

/// Per-segment breakdown
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentNps {
    pub summary: NpsSummary,
    /// Mean raw score of the segment's responses
    pub average_score: f64,
}

/// Classifies and aggregates survey scores
#[derive(Debug, Clone, Copy, Default)]
pub struct NpsAggregator;

impl NpsAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, score: i32) -> EngineResult<NpsCategory> {
        Ok(NpsScore::new(score)?.category())
    }

    /// Aggregate raw scores. Any out-of-range score rejects the whole input.
    pub fn aggregate(&self, scores: &[i32]) -> EngineResult<NpsSummary> {
        let scores = scores
            .iter()
            .map(|s| NpsScore::new(*s))
            .collect::<Result<Vec<_>, _>>()?;
        summarize(scores)
    }

    pub fn aggregate_responses(&self, responses: &[NpsResponse]) -> EngineResult<NpsSummary> {
        summarize(responses.iter().map(|r| r.score))
    }

    /// Aggregate per segment label. Responses without a segment are left out.
    pub fn aggregate_by_segment(
        &self,
        responses: &[NpsResponse],
    ) -> EngineResult<BTreeMap<String, SegmentNps>> {
        let mut groups: BTreeMap<&str, Vec<NpsScore>> = BTreeMap::new();
        for response in responses {
            if let Some(segment) = response.segment.as_deref() {
                groups.entry(segment).or_default().push(response.score);
            }
        }

        groups
            .into_iter()
            .map(|(segment, scores)| -> EngineResult<(String, SegmentNps)> {
                let sum: u64 = scores.iter().map(|s| u64::from(s.value())).sum();
                let average_score = sum as f64 / scores.len() as f64;
                let summary = summarize(scores)?;
                Ok((
                    segment.to_string(),
                    SegmentNps {
                        summary,
                        average_score,
                    },
                ))
            })
            .collect()
    }
}

fn summarize(scores: impl IntoIterator<Item = NpsScore>) -> EngineResult<NpsSummary> {
    let (mut promoters, mut passives, mut detractors) = (0u64, 0u64, 0u64);
    for score in scores {
        match score.category() {
            NpsCategory::Promoter => promoters += 1,
            NpsCategory::Passive => passives += 1,
            NpsCategory::Detractor => detractors += 1,
        }
    }

    let total = promoters + passives + detractors;
    if total == 0 {
        return Err(EngineError::EmptyInput);
    }

    Ok(NpsSummary {
        nps_score: round_half_up(
            (promoters as i64 - detractors as i64) * 100,
            total as i64,
        ) as i32,
        promoters,
        passives,
        detractors,
        total,
    })
}

/// `floor(n / d + 1/2)` for positive `d`
fn round_half_up(n: i64, d: i64) -> i64 {
    (2 * n + d).div_euclid(2 * d)
}
