//! Engine configuration.
//!
//! Voting rules, segment weights and lock timing. Loaded from TOML; every
//! section and field is optional and falls back to its default.

use std::path::Path;
use std::time::Duration;

use pulse_types::{PlanTier, VoteWeight};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Configuration for the feedback engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Vote casting rules.
    pub voting: VotingConfig,

    /// Segment weighting.
    pub weighting: WeightingConfig,

    /// Per-idea lock behaviour.
    pub locking: LockingConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        let config: EngineConfig =
            toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> EngineResult<()> {
        if self.voting.max_votes_per_user == Some(0) {
            return Err(EngineError::Config(
                "voting.max_votes_per_user must be at least 1".into(),
            ));
        }
        if self.locking.lock_timeout_ms == 0 {
            return Err(EngineError::Config(
                "locking.lock_timeout_ms must be positive".into(),
            ));
        }
        for tier in [PlanTier::Free, PlanTier::Pro, PlanTier::Enterprise] {
            self.weighting.weight_for(tier)?;
        }
        Ok(())
    }
}

/// Vote casting rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Let a user re-cast an existing vote with a different weight.
    pub allow_vote_changes: bool,

    /// Active votes a single user may hold across all ideas. `None` is unlimited.
    pub max_votes_per_user: Option<u32>,
}

/// Vote weights by plan tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightingConfig {
    /// When disabled every vote counts as 1.
    pub enabled: bool,

    pub free: Decimal,
    pub pro: Decimal,
    pub enterprise: Decimal,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            free: Decimal::ONE,
            pro: Decimal::from(2),
            enterprise: Decimal::from(3),
        }
    }
}

impl WeightingConfig {
    /// Configured weight for a tier
    pub fn weight_for(&self, tier: PlanTier) -> EngineResult<VoteWeight> {
        let raw = match tier {
            PlanTier::Free => self.free,
            PlanTier::Pro => self.pro,
            PlanTier::Enterprise => self.enterprise,
        };
        VoteWeight::new(raw)
            .map_err(|_| EngineError::Config(format!("weighting.{} must be positive", tier)))
    }
}

/// Per-idea lock behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockingConfig {
    /// Upper bound on waiting for every lock an operation needs.
    pub lock_timeout_ms: u64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 250,
        }
    }
}

impl LockingConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
