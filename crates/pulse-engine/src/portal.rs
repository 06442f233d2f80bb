//! Feedback portal facade.
//!
//! Owns the store, lock table, configuration and weight provider, and hands
//! out the logic units wired to them.

use std::sync::Arc;

use pulse_store::{FeedbackStore, InMemoryFeedbackStore, WriteBatch};
use pulse_types::{Idea, IdeaCategory, IdeaId, IdeaStatus};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::ledger::VoteLedger;
use crate::load_idea;
use crate::locks::IdeaLocks;
use crate::merge::MergeCoordinator;
use crate::nps::NpsAggregator;
use crate::subscriptions::Subscriptions;
use crate::weights::{UniformWeights, WeightProvider};
use crate::workflow::StatusWorkflow;

/// Entry point for the excluded API layer
pub struct FeedbackPortal {
    store: Arc<dyn FeedbackStore>,
    locks: Arc<IdeaLocks>,
    weights: Arc<dyn WeightProvider>,
    config: EngineConfig,
}

impl FeedbackPortal {
    /// Portal with uniform vote weights
    pub fn new(store: Arc<dyn FeedbackStore>, config: EngineConfig) -> EngineResult<Self> {
        Self::with_weights(store, config, Arc::new(UniformWeights))
    }

    pub fn with_weights(
        store: Arc<dyn FeedbackStore>,
        config: EngineConfig,
        weights: Arc<dyn WeightProvider>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let locks = Arc::new(IdeaLocks::new(config.locking.lock_timeout()));
        Ok(Self {
            store,
            locks,
            weights,
            config,
        })
    }

    /// Portal over a fresh in-memory store with default configuration
    pub fn in_memory() -> Self {
        let config = EngineConfig::default();
        Self {
            store: Arc::new(InMemoryFeedbackStore::new()),
            locks: Arc::new(IdeaLocks::new(config.locking.lock_timeout())),
            weights: Arc::new(UniformWeights),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn FeedbackStore> {
        Arc::clone(&self.store)
    }

    /// Create an idea in `New` with no votes
    pub fn submit_idea(
        &self,
        title: impl Into<String>,
        category: IdeaCategory,
    ) -> EngineResult<Idea> {
        let idea = Idea::new(title, category);
        let mut batch = WriteBatch::new();
        batch.put_idea(idea.clone());
        self.store.commit(batch)?;

        info!(idea = %idea.id, title = %idea.title, "idea submitted");
        Ok(idea)
    }

    pub fn idea(&self, id: &IdeaId) -> EngineResult<Idea> {
        load_idea(self.store.as_ref(), id)
    }

    /// Ideas in `status`, most voted first
    pub fn ideas_in(&self, status: IdeaStatus) -> EngineResult<Vec<Idea>> {
        let mut ideas: Vec<Idea> = self
            .store
            .list_ideas()?
            .into_iter()
            .filter(|i| i.status == status)
            .collect();
        ideas.sort_by(|a, b| {
            b.vote_count
                .cmp(&a.vote_count)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(ideas)
    }

    pub fn ledger(&self) -> VoteLedger {
        VoteLedger::new(
            Arc::clone(&self.store),
            Arc::clone(&self.locks),
            Arc::clone(&self.weights),
            self.config.voting.clone(),
            self.config.weighting.enabled,
        )
    }

    pub fn workflow(&self) -> StatusWorkflow {
        StatusWorkflow::new(Arc::clone(&self.store), Arc::clone(&self.locks))
    }

    pub fn merger(&self) -> MergeCoordinator {
        MergeCoordinator::new(Arc::clone(&self.store), Arc::clone(&self.locks), self.ledger())
    }

    pub fn subscriptions(&self) -> Subscriptions {
        Subscriptions::new(Arc::clone(&self.store), Arc::clone(&self.locks))
    }

    pub fn nps(&self) -> NpsAggregator {
        NpsAggregator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::weights::PlanWeights;
    use pulse_types::{PlanTier, UserId};
    use rust_decimal::Decimal;

    #[test]
    fn test_submit_and_fetch() {
        let portal = FeedbackPortal::in_memory();
        let idea = portal
            .submit_idea("Slack integration", IdeaCategory::Integration)
            .unwrap();

        let fetched = portal.idea(&idea.id).unwrap();
        assert_eq!(fetched, idea);
        assert_eq!(fetched.status, IdeaStatus::New);
        assert!(matches!(
            portal.idea(&IdeaId::new("missing")),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.locking.lock_timeout_ms = 0;
        let result = FeedbackPortal::new(Arc::new(InMemoryFeedbackStore::new()), config);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_ideas_in_sorted_by_votes() {
        let portal = FeedbackPortal::in_memory();
        let quiet = portal.submit_idea("Quiet", IdeaCategory::Other).unwrap();
        let popular = portal.submit_idea("Popular", IdeaCategory::Feature).unwrap();
        let ledger = portal.ledger();
        for user in ["u1", "u2"] {
            ledger
                .cast_segment_vote(&popular.id, &UserId::new(user))
                .unwrap();
        }
        ledger.cast_segment_vote(&quiet.id, &UserId::new("u1")).unwrap();

        let ids: Vec<IdeaId> = portal
            .ideas_in(IdeaStatus::New)
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![popular.id, quiet.id]);
    }

    #[test]
    fn test_weighted_portal() {
        let config = EngineConfig::default();
        let weights = PlanWeights::from_config(&config.weighting)
            .unwrap()
            .with_plan(UserId::new("u4"), PlanTier::Enterprise);
        let portal = FeedbackPortal::with_weights(
            Arc::new(InMemoryFeedbackStore::new()),
            config,
            Arc::new(weights),
        )
        .unwrap();

        let idea = portal.submit_idea("Mobile apps", IdeaCategory::Feature).unwrap();
        let receipt = portal
            .ledger()
            .cast_segment_vote(&idea.id, &UserId::new("u4"))
            .unwrap();
        assert_eq!(receipt.new_total, Decimal::from(3));
    }
}
