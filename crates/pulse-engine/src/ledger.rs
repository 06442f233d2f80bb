//! Vote ledger.
//!
//! Records one active vote per (idea, user) and keeps `Idea::vote_count`
//! equal to the sum of those votes' weights. Every mutation runs under the
//! idea's lock and commits the vote and idea records in one batch.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use pulse_store::{FeedbackStore, WriteBatch};
use pulse_types::{IdeaId, UserId, Vote, VoteWeight};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::VotingConfig;
use crate::error::{EngineError, EngineResult};
use crate::load_idea;
use crate::locks::{IdeaLocks, LockKey};
use crate::weights::WeightProvider;

/// Outcome of a cast or retract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub idea_id: IdeaId,
    pub user_id: UserId,
    /// Idea total after the operation
    pub new_total: Decimal,
}

/// Point-in-time tally of an idea
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tally {
    pub idea_id: IdeaId,
    /// The idea's recorded `vote_count`
    pub total: Decimal,
    pub voter_ids: BTreeSet<UserId>,
    /// Active votes keyed by voter
    pub votes: BTreeMap<UserId, Vote>,
}

impl Tally {
    pub fn weight_of(&self, user_id: &UserId) -> Option<VoteWeight> {
        self.votes.get(user_id).map(|v| v.weight)
    }
}

/// Outcome of a vote reset
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReceipt {
    pub ideas_reset: usize,
    pub votes_removed: usize,
}

/// Comparison of the recorded total against the active votes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteAudit {
    pub idea_id: IdeaId,
    pub recorded: Decimal,
    pub computed: Decimal,
    pub recorded_voters: usize,
    pub active_votes: usize,
}

impl VoteAudit {
    pub fn is_consistent(&self) -> bool {
        self.recorded == self.computed && self.recorded_voters == self.active_votes
    }
}

/// Casts, retracts and tallies votes
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn FeedbackStore>,
    locks: Arc<IdeaLocks>,
    weights: Arc<dyn WeightProvider>,
    voting: VotingConfig,
    weighting_enabled: bool,
}

impl VoteLedger {
    pub fn new(
        store: Arc<dyn FeedbackStore>,
        locks: Arc<IdeaLocks>,
        weights: Arc<dyn WeightProvider>,
        voting: VotingConfig,
        weighting_enabled: bool,
    ) -> Self {
        Self {
            store,
            locks,
            weights,
            voting,
            weighting_enabled,
        }
    }

    /// Cast a vote with an explicit weight.
    pub fn cast_vote(
        &self,
        idea_id: &IdeaId,
        user_id: &UserId,
        weight: VoteWeight,
    ) -> EngineResult<VoteReceipt> {
        let mut keys = vec![LockKey::Idea(idea_id.clone())];
        if self.voting.max_votes_per_user.is_some() {
            keys.push(LockKey::User(user_id.clone()));
        }

        self.locks
            .with_locked(keys, || self.cast_locked(idea_id, user_id, weight))
    }

    /// Cast a vote weighted by the user's segment.
    ///
    /// Falls back to weight 1 when weighting is off or the user has no segment.
    pub fn cast_segment_vote(
        &self,
        idea_id: &IdeaId,
        user_id: &UserId,
    ) -> EngineResult<VoteReceipt> {
        self.cast_vote(idea_id, user_id, self.resolve_weight(user_id))
    }

    pub fn resolve_weight(&self, user_id: &UserId) -> VoteWeight {
        if !self.weighting_enabled {
            return VoteWeight::ONE;
        }
        self.weights.weight_for(user_id).unwrap_or_default()
    }

    fn cast_locked(
        &self,
        idea_id: &IdeaId,
        user_id: &UserId,
        weight: VoteWeight,
    ) -> EngineResult<VoteReceipt> {
        let mut idea = load_idea(self.store.as_ref(), idea_id)?;
        if let Some(primary) = &idea.merged_into {
            return Err(EngineError::VotingClosed {
                idea_id: idea_id.clone(),
                merged_into: primary.clone(),
            });
        }

        match self.store.get_vote(idea_id, user_id)? {
            Some(existing) => {
                if !self.voting.allow_vote_changes {
                    return Err(EngineError::AlreadyVoted {
                        idea_id: idea_id.clone(),
                        user_id: user_id.clone(),
                    });
                }
                if existing.weight == weight {
                    debug!(idea = %idea_id, user = %user_id, "vote unchanged");
                    return Err(EngineError::NoOp {
                        idea_id: idea_id.clone(),
                        user_id: user_id.clone(),
                    });
                }
                idea.vote_count = idea.vote_count - existing.weight.value() + weight.value();
            }
            None => {
                if let Some(limit) = self.voting.max_votes_per_user {
                    let held = self.store.votes_by_user(user_id)?.len();
                    if held >= limit as usize {
                        return Err(EngineError::VoteLimitReached {
                            user_id: user_id.clone(),
                            limit,
                        });
                    }
                }
                idea.vote_count += weight.value();
                idea.voter_ids.insert(user_id.clone());
            }
        }

        let now = Utc::now();
        idea.updated_at = now;
        let new_total = idea.vote_count;

        let mut vote = Vote::new(idea_id.clone(), user_id.clone(), weight);
        vote.cast_at = now;

        let mut batch = WriteBatch::new();
        batch.put_vote(vote).put_idea(idea);
        self.store.commit(batch)?;

        info!(idea = %idea_id, user = %user_id, %weight, total = %new_total, "vote cast");
        Ok(VoteReceipt {
            idea_id: idea_id.clone(),
            user_id: user_id.clone(),
            new_total,
        })
    }

    /// Withdraw a user's vote, subtracting its original weight.
    pub fn retract_vote(&self, idea_id: &IdeaId, user_id: &UserId) -> EngineResult<VoteReceipt> {
        self.locks.with_locked([LockKey::Idea(idea_id.clone())], || {
            let mut idea = load_idea(self.store.as_ref(), idea_id)?;
            let vote = self.store.get_vote(idea_id, user_id)?.ok_or_else(|| {
                EngineError::NoSuchVote {
                    idea_id: idea_id.clone(),
                    user_id: user_id.clone(),
                }
            })?;

            idea.vote_count -= vote.weight.value();
            idea.voter_ids.remove(user_id);
            idea.updated_at = Utc::now();
            let new_total = idea.vote_count;

            let mut batch = WriteBatch::new();
            batch
                .remove_vote(idea_id.clone(), user_id.clone())
                .put_idea(idea);
            self.store.commit(batch)?;

            info!(idea = %idea_id, user = %user_id, total = %new_total, "vote retracted");
            Ok(VoteReceipt {
                idea_id: idea_id.clone(),
                user_id: user_id.clone(),
                new_total,
            })
        })
    }

    /// Current tally of an idea. Pure read.
    ///
    /// The idea and its votes come from one store snapshot, so the recorded
    /// total always matches the votes returned alongside it.
    pub fn tally(&self, idea_id: &IdeaId) -> EngineResult<Tally> {
        let (idea, votes) = self
            .store
            .idea_with_votes(idea_id)?
            .ok_or_else(|| EngineError::NotFound(idea_id.clone()))?;
        let votes = votes.into_iter().map(|v| (v.user_id.clone(), v)).collect();

        Ok(Tally {
            idea_id: idea.id,
            total: idea.vote_count,
            voter_ids: idea.voter_ids,
            votes,
        })
    }

    /// Drop every vote on one idea.
    pub fn reset_votes(&self, idea_id: &IdeaId) -> EngineResult<ResetReceipt> {
        self.locks.with_locked([LockKey::Idea(idea_id.clone())], || {
            self.reset_locked(std::slice::from_ref(idea_id))
        })
    }

    /// Drop every vote on every idea.
    pub fn reset_all_votes(&self) -> EngineResult<ResetReceipt> {
        let ids: Vec<IdeaId> = self.store.list_ideas()?.into_iter().map(|i| i.id).collect();
        self.locks
            .with_locked(ids.iter().cloned().map(LockKey::Idea), || {
                self.reset_locked(&ids)
            })
    }

    fn reset_locked(&self, ids: &[IdeaId]) -> EngineResult<ResetReceipt> {
        let now = Utc::now();
        let mut batch = WriteBatch::new();
        let mut receipt = ResetReceipt::default();

        for idea_id in ids {
            let mut idea = load_idea(self.store.as_ref(), idea_id)?;
            let votes = self.store.votes_for(idea_id)?;
            if votes.is_empty() && idea.vote_count.is_zero() {
                continue;
            }

            receipt.ideas_reset += 1;
            receipt.votes_removed += votes.len();
            for vote in votes {
                batch.remove_vote(vote.idea_id, vote.user_id);
            }
            idea.vote_count = Decimal::ZERO;
            idea.voter_ids.clear();
            idea.updated_at = now;
            batch.put_idea(idea);
        }

        if !batch.is_empty() {
            self.store.commit(batch)?;
        }
        info!(
            ideas = receipt.ideas_reset,
            votes = receipt.votes_removed,
            "votes reset"
        );
        Ok(receipt)
    }

    /// Recompute an idea's total from its active votes.
    pub fn audit(&self, idea_id: &IdeaId) -> EngineResult<VoteAudit> {
        let tally = self.tally(idea_id)?;
        let computed = tally.votes.values().map(|v| v.weight.value()).sum();

        let audit = VoteAudit {
            idea_id: idea_id.clone(),
            recorded: tally.total,
            computed,
            recorded_voters: tally.voter_ids.len(),
            active_votes: tally.votes.len(),
        };
        if !audit.is_consistent() {
            warn!(
                idea = %idea_id,
                recorded = %audit.recorded,
                computed = %audit.computed,
                "vote total diverged from active votes"
            );
        }
        Ok(audit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightingConfig;
    use crate::weights::{PlanWeights, UniformWeights};
    use pulse_store::InMemoryFeedbackStore;
    use pulse_types::{Idea, IdeaCategory, PlanTier};
    use std::time::Duration;

    fn ledger_with(voting: VotingConfig) -> (VoteLedger, Arc<InMemoryFeedbackStore>, IdeaId) {
        let store = Arc::new(InMemoryFeedbackStore::new());
        let idea = Idea::new("Dark mode support", IdeaCategory::Ux);
        let id = idea.id.clone();
        let mut batch = WriteBatch::new();
        batch.put_idea(idea);
        store.commit(batch).unwrap();

        let ledger = VoteLedger::new(
            store.clone(),
            Arc::new(IdeaLocks::new(Duration::from_millis(100))),
            Arc::new(UniformWeights),
            voting,
            true,
        );
        (ledger, store, id)
    }

    fn w(n: u32) -> VoteWeight {
        VoteWeight::units(n).unwrap()
    }

    #[test]
    fn test_cast_adds_weight_and_voter() {
        let (ledger, _, id) = ledger_with(VotingConfig::default());
        let user = UserId::new("u1");

        let receipt = ledger.cast_vote(&id, &user, w(2)).unwrap();
        assert_eq!(receipt.new_total, Decimal::from(2));

        let tally = ledger.tally(&id).unwrap();
        assert_eq!(tally.total, Decimal::from(2));
        assert!(tally.voter_ids.contains(&user));
        assert_eq!(tally.weight_of(&user), Some(w(2)));
        assert!(ledger.audit(&id).unwrap().is_consistent());
    }

    #[test]
    fn test_second_cast_rejected() {
        let (ledger, _, id) = ledger_with(VotingConfig::default());
        let user = UserId::new("u1");
        ledger.cast_vote(&id, &user, w(1)).unwrap();

        let err = ledger.cast_vote(&id, &user, w(3)).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyVoted { .. }));
        assert_eq!(ledger.tally(&id).unwrap().total, Decimal::ONE);
    }

    #[test]
    fn test_vote_change_replaces_weight() {
        let (ledger, _, id) = ledger_with(VotingConfig {
            allow_vote_changes: true,
            max_votes_per_user: None,
        });
        let user = UserId::new("u1");
        ledger.cast_vote(&id, &user, w(1)).unwrap();
        ledger.cast_vote(&id, &UserId::new("u2"), w(1)).unwrap();

        let receipt = ledger.cast_vote(&id, &user, w(3)).unwrap();
        assert_eq!(receipt.new_total, Decimal::from(4));

        let err = ledger.cast_vote(&id, &user, w(3)).unwrap_err();
        assert!(matches!(err, EngineError::NoOp { .. }));

        let tally = ledger.tally(&id).unwrap();
        assert_eq!(tally.voter_ids.len(), 2);
        assert!(ledger.audit(&id).unwrap().is_consistent());
    }

    #[test]
    fn test_cast_then_retract_restores_total() {
        let (ledger, _, id) = ledger_with(VotingConfig::default());
        ledger.cast_vote(&id, &UserId::new("u1"), w(2)).unwrap();
        let before = ledger.tally(&id).unwrap().total;

        let user = UserId::new("u2");
        ledger
            .cast_vote(&id, &user, VoteWeight::new(Decimal::new(15, 1)).unwrap())
            .unwrap();
        let receipt = ledger.retract_vote(&id, &user).unwrap();

        assert_eq!(receipt.new_total, before);
        assert!(!ledger.tally(&id).unwrap().voter_ids.contains(&user));
    }

    #[test]
    fn test_retract_without_vote() {
        let (ledger, _, id) = ledger_with(VotingConfig::default());
        let err = ledger.retract_vote(&id, &UserId::new("u1")).unwrap_err();
        assert!(matches!(err, EngineError::NoSuchVote { .. }));
    }

    #[test]
    fn test_missing_idea() {
        let (ledger, _, _) = ledger_with(VotingConfig::default());
        let missing = IdeaId::new("missing");
        assert!(matches!(
            ledger.cast_vote(&missing, &UserId::new("u1"), w(1)),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(ledger.tally(&missing), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_cast_on_merged_idea_is_closed() {
        let (ledger, store, primary) = ledger_with(VotingConfig::default());
        let mut duplicate = Idea::new("Night theme", IdeaCategory::Ux);
        let duplicate_id = duplicate.id.clone();
        duplicate.record_status(pulse_types::IdeaStatus::Duplicate, Utc::now());
        duplicate.merged_into = Some(primary.clone());
        let mut batch = WriteBatch::new();
        batch.put_idea(duplicate);
        store.commit(batch).unwrap();

        ledger.cast_vote(&primary, &UserId::new("u1"), w(1)).unwrap();
        let primary_before = ledger.tally(&primary).unwrap();
        let duplicate_before = ledger.tally(&duplicate_id).unwrap();

        let err = ledger
            .cast_vote(&duplicate_id, &UserId::new("u2"), w(2))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::VotingClosed { ref merged_into, .. } if *merged_into == primary
        ));
        assert!(!err.is_retryable());
        assert_eq!(ledger.tally(&primary).unwrap(), primary_before);
        assert_eq!(ledger.tally(&duplicate_id).unwrap(), duplicate_before);
        assert_eq!(store.vote_count().unwrap(), 1);
    }

    #[test]
    fn test_vote_limit_per_user() {
        let (ledger, store, first) = ledger_with(VotingConfig {
            allow_vote_changes: false,
            max_votes_per_user: Some(1),
        });
        let second = Idea::new("Mobile apps", IdeaCategory::Feature);
        let second_id = second.id.clone();
        let mut batch = WriteBatch::new();
        batch.put_idea(second);
        store.commit(batch).unwrap();

        let user = UserId::new("u1");
        ledger.cast_vote(&first, &user, w(1)).unwrap();
        let err = ledger.cast_vote(&second_id, &user, w(1)).unwrap_err();
        assert!(matches!(err, EngineError::VoteLimitReached { limit: 1, .. }));

        ledger.retract_vote(&first, &user).unwrap();
        assert!(ledger.cast_vote(&second_id, &user, w(1)).is_ok());
    }

    #[test]
    fn test_segment_weights() {
        let (base, store, id) = ledger_with(VotingConfig::default());
        let weights = PlanWeights::from_config(&WeightingConfig::default())
            .unwrap()
            .with_plan(UserId::new("ent"), PlanTier::Enterprise);
        let ledger = VoteLedger::new(
            store.clone(),
            base.locks.clone(),
            Arc::new(weights),
            VotingConfig::default(),
            true,
        );

        ledger.cast_segment_vote(&id, &UserId::new("ent")).unwrap();
        let receipt = ledger.cast_segment_vote(&id, &UserId::new("anon")).unwrap();
        assert_eq!(receipt.new_total, Decimal::from(4));

        let unweighted = VoteLedger::new(
            store,
            base.locks.clone(),
            Arc::new(UniformWeights),
            VotingConfig::default(),
            false,
        );
        assert_eq!(unweighted.resolve_weight(&UserId::new("ent")), VoteWeight::ONE);
    }

    #[test]
    fn test_reset_votes() {
        let (ledger, store, id) = ledger_with(VotingConfig::default());
        ledger.cast_vote(&id, &UserId::new("u1"), w(1)).unwrap();
        ledger.cast_vote(&id, &UserId::new("u2"), w(2)).unwrap();

        let receipt = ledger.reset_all_votes().unwrap();
        assert_eq!(receipt, ResetReceipt { ideas_reset: 1, votes_removed: 2 });

        let tally = ledger.tally(&id).unwrap();
        assert!(tally.total.is_zero());
        assert!(tally.voter_ids.is_empty());
        assert_eq!(store.vote_count().unwrap(), 0);

        assert_eq!(ledger.reset_votes(&id).unwrap(), ResetReceipt::default());
    }
}
