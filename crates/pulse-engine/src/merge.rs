//! Duplicate merging.
//!
//! Folds secondary ideas into a primary. Votes move to the primary; a user
//! who voted on more than one of the merged ideas keeps a single vote with
//! the largest of their weights. Subscribers are redirected to the primary,
//! again counted once per user. Merges cannot be undone.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use pulse_store::{FeedbackStore, WriteBatch};
use pulse_types::{Idea, IdeaId, IdeaStatus, UserId, Vote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::ledger::VoteLedger;
use crate::load_idea;
use crate::locks::{IdeaLocks, LockKey};
use crate::workflow::can_become_duplicate;

/// Outcome of a merge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReceipt {
    pub primary_id: IdeaId,
    pub primary_vote_total: Decimal,
    /// Ideas merged by this call; already-merged secondaries are not counted
    pub merged_count: usize,
    pub merged_ids: Vec<IdeaId>,
}

/// Consolidates duplicate ideas into a primary
#[derive(Clone)]
pub struct MergeCoordinator {
    store: Arc<dyn FeedbackStore>,
    locks: Arc<IdeaLocks>,
    ledger: VoteLedger,
}

impl MergeCoordinator {
    pub fn new(store: Arc<dyn FeedbackStore>, locks: Arc<IdeaLocks>, ledger: VoteLedger) -> Self {
        Self {
            store,
            locks,
            ledger,
        }
    }

    /// Merge `secondary_ids` into `primary_id`.
    ///
    /// Either every pending secondary is merged or nothing is written.
    /// Secondaries already merged into this primary are skipped.
    pub fn merge(
        &self,
        primary_id: &IdeaId,
        secondary_ids: &[IdeaId],
        reason: Option<String>,
    ) -> EngineResult<MergeReceipt> {
        if secondary_ids.is_empty() {
            return Err(EngineError::InvalidMergeTarget {
                idea_id: primary_id.clone(),
                reason: "no secondary ideas given".into(),
            });
        }
        if secondary_ids.contains(primary_id) {
            return Err(EngineError::InvalidMergeTarget {
                idea_id: primary_id.clone(),
                reason: "primary listed as its own duplicate".into(),
            });
        }

        let mut seen = BTreeSet::new();
        let secondary_ids: Vec<IdeaId> = secondary_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();

        // Earlier duplicates of a secondary get re-pointed at the new primary,
        // so they are locked as well.
        let dependents = self.dependents_of(&secondary_ids)?;
        let keys = std::iter::once(primary_id)
            .chain(secondary_ids.iter())
            .chain(dependents.iter())
            .cloned()
            .map(LockKey::Idea);

        self.locks.with_locked(keys, || {
            self.merge_locked(primary_id, &secondary_ids, &dependents, reason)
        })
    }

    /// Ideas currently merged into any of `ids`
    fn dependents_of(&self, ids: &[IdeaId]) -> EngineResult<BTreeSet<IdeaId>> {
        Ok(self
            .store
            .list_ideas()?
            .into_iter()
            .filter(|idea| idea.merged_into.as_ref().is_some_and(|t| ids.contains(t)))
            .map(|idea| idea.id)
            .collect())
    }

    fn merge_locked(
        &self,
        primary_id: &IdeaId,
        secondary_ids: &[IdeaId],
        locked_dependents: &BTreeSet<IdeaId>,
        reason: Option<String>,
    ) -> EngineResult<MergeReceipt> {
        let mut primary = load_idea(self.store.as_ref(), primary_id)?;
        if primary.is_duplicate() {
            return Err(EngineError::InvalidMergeTarget {
                idea_id: primary_id.clone(),
                reason: "primary is itself a duplicate".into(),
            });
        }

        // Load everything before deciding anything so a missing id rejects
        // the whole call.
        let secondaries = secondary_ids
            .iter()
            .map(|id| load_idea(self.store.as_ref(), id))
            .collect::<EngineResult<Vec<Idea>>>()?;

        let mut pending = Vec::new();
        for secondary in secondaries {
            match &secondary.merged_into {
                Some(target) if target == primary_id => {
                    debug!(idea = %secondary.id, primary = %primary_id, "already merged, skipping");
                }
                Some(target) => {
                    return Err(EngineError::InvalidMergeTarget {
                        idea_id: secondary.id.clone(),
                        reason: format!("already merged into {}", target),
                    });
                }
                None if !can_become_duplicate(secondary.status) => {
                    return Err(EngineError::InvalidMergeTarget {
                        idea_id: secondary.id.clone(),
                        reason: format!("cannot merge an idea in status {}", secondary.status),
                    });
                }
                None => pending.push(secondary),
            }
        }

        if pending.is_empty() {
            return Ok(MergeReceipt {
                primary_id: primary_id.clone(),
                primary_vote_total: primary.vote_count,
                merged_count: 0,
                merged_ids: Vec::new(),
            });
        }

        let pending_ids: Vec<IdeaId> = pending.iter().map(|s| s.id.clone()).collect();
        let mut dependents = Vec::new();
        for id in self.dependents_of(&pending_ids)? {
            if !locked_dependents.contains(&id) {
                // merged into one of our secondaries after we picked locks
                return Err(EngineError::Contention { key: id.to_string() });
            }
            dependents.push(load_idea(self.store.as_ref(), &id)?);
        }

        let mut batch = WriteBatch::new();
        let mut merged: BTreeMap<UserId, Vote> = self.ledger.tally(primary_id)?.votes;
        let mut moved: BTreeSet<UserId> = BTreeSet::new();

        for secondary in &pending {
            let tally = self.ledger.tally(&secondary.id)?;
            for (user_id, vote) in tally.votes {
                batch.remove_vote(secondary.id.clone(), user_id.clone());
                let wins = merged
                    .get(&user_id)
                    .map_or(true, |current| vote.weight > current.weight);
                if wins {
                    moved.insert(user_id.clone());
                    merged.insert(user_id, vote.moved_to(primary_id.clone(), vote.weight));
                }
            }
        }

        for user_id in &moved {
            if let Some(vote) = merged.get(user_id) {
                batch.put_vote(vote.clone());
            }
        }

        let now = Utc::now();
        let subscribers_before = primary.subscriber_ids.len();
        primary.vote_count = merged.values().map(|v| v.weight.value()).sum();
        primary.voter_ids = merged.keys().cloned().collect();
        primary.updated_at = now;
        let primary_vote_total = primary.vote_count;

        let mut merged_ids = Vec::with_capacity(pending.len());
        for mut secondary in pending {
            secondary.record_status(IdeaStatus::Duplicate, now);
            secondary.merged_into = Some(primary_id.clone());
            secondary.merge_reason = reason.clone();
            secondary.vote_count = Decimal::ZERO;
            secondary.voter_ids.clear();
            primary.subscriber_ids.append(&mut secondary.subscriber_ids);
            merged_ids.push(secondary.id.clone());
            batch.put_idea(secondary);
        }
        let absorbed_subscribers = primary.subscriber_ids.len() - subscribers_before;
        for mut dependent in dependents {
            dependent.merged_into = Some(primary_id.clone());
            dependent.updated_at = now;
            batch.put_idea(dependent);
        }
        batch.put_idea(primary);
        self.store.commit(batch)?;

        info!(
            primary = %primary_id,
            merged = merged_ids.len(),
            total = %primary_vote_total,
            subscribers = absorbed_subscribers,
            "ideas merged"
        );
        Ok(MergeReceipt {
            primary_id: primary_id.clone(),
            primary_vote_total,
            merged_count: merged_ids.len(),
            merged_ids,
        })
    }
}
