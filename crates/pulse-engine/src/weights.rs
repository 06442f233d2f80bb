//! Voter weight lookup.
//!
//! The engine asks a [`WeightProvider`] for a user's weight when a vote is
//! cast by segment. Users the provider does not know vote with weight 1.

use dashmap::DashMap;
use pulse_types::{PlanTier, UserId, VoteWeight};

use crate::config::WeightingConfig;
use crate::error::EngineResult;

/// Source of per-user vote weights
pub trait WeightProvider: Send + Sync {
    /// Weight for `user_id`, or `None` when no segment data exists
    fn weight_for(&self, user_id: &UserId) -> Option<VoteWeight>;
}

/// Every user weighs the same
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformWeights;

impl WeightProvider for UniformWeights {
    fn weight_for(&self, _user_id: &UserId) -> Option<VoteWeight> {
        None
    }
}

/// Weights resolved from each user's plan tier
pub struct PlanWeights {
    plans: DashMap<UserId, PlanTier>,
    free: VoteWeight,
    pro: VoteWeight,
    enterprise: VoteWeight,
}

impl PlanWeights {
    pub fn from_config(config: &WeightingConfig) -> EngineResult<Self> {
        Ok(Self {
            plans: DashMap::new(),
            free: config.weight_for(PlanTier::Free)?,
            pro: config.weight_for(PlanTier::Pro)?,
            enterprise: config.weight_for(PlanTier::Enterprise)?,
        })
    }

    /// Record (or change) the plan a user is on
    pub fn assign(&self, user_id: UserId, tier: PlanTier) {
        self.plans.insert(user_id, tier);
    }

    pub fn with_plan(self, user_id: UserId, tier: PlanTier) -> Self {
        self.assign(user_id, tier);
        self
    }

    pub fn tier_weight(&self, tier: PlanTier) -> VoteWeight {
        match tier {
            PlanTier::Free => self.free,
            PlanTier::Pro => self.pro,
            PlanTier::Enterprise => self.enterprise,
        }
    }
}

impl WeightProvider for PlanWeights {
    fn weight_for(&self, user_id: &UserId) -> Option<VoteWeight> {
        self.plans.get(user_id).map(|tier| self.tier_weight(*tier))
    }
}
