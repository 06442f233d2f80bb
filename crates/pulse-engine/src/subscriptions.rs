//! Idea subscriptions.
//!
//! A subscription on a merged duplicate lands on its primary, the same
//! place a merge redirects existing subscribers to.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use pulse_store::{FeedbackStore, WriteBatch};
use pulse_types::{IdeaId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::load_idea;
use crate::locks::{IdeaLocks, LockKey};

/// Outcome of a subscribe or unsubscribe
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionReceipt {
    /// Idea the subscription applies to, after following a merge
    pub idea_id: IdeaId,
    pub user_id: UserId,
    pub subscriber_count: u64,
    /// False when the user was already in (or already out of) the set
    pub changed: bool,
}

/// Manages who follows an idea
#[derive(Clone)]
pub struct Subscriptions {
    store: Arc<dyn FeedbackStore>,
    locks: Arc<IdeaLocks>,
}

impl Subscriptions {
    pub fn new(store: Arc<dyn FeedbackStore>, locks: Arc<IdeaLocks>) -> Self {
        Self { store, locks }
    }

    /// Follow an idea. Subscribing twice is not an error.
    pub fn subscribe(
        &self,
        idea_id: &IdeaId,
        user_id: &UserId,
    ) -> EngineResult<SubscriptionReceipt> {
        self.update(idea_id, user_id, true)
    }

    /// Stop following an idea. Unsubscribing twice is not an error.
    pub fn unsubscribe(
        &self,
        idea_id: &IdeaId,
        user_id: &UserId,
    ) -> EngineResult<SubscriptionReceipt> {
        self.update(idea_id, user_id, false)
    }

    /// Current subscribers of an idea, following a merge to its primary
    pub fn subscribers(&self, idea_id: &IdeaId) -> EngineResult<BTreeSet<UserId>> {
        let target = self.resolve(idea_id)?;
        Ok(load_idea(self.store.as_ref(), &target)?.subscriber_ids)
    }

    /// The idea that actually holds subscriptions for `idea_id`
    fn resolve(&self, idea_id: &IdeaId) -> EngineResult<IdeaId> {
        let idea = load_idea(self.store.as_ref(), idea_id)?;
        Ok(idea.merged_into.unwrap_or(idea.id))
    }

    fn update(
        &self,
        idea_id: &IdeaId,
        user_id: &UserId,
        subscribe: bool,
    ) -> EngineResult<SubscriptionReceipt> {
        let target = self.resolve(idea_id)?;

        self.locks.with_locked([LockKey::Idea(target.clone())], || {
            let mut idea = load_idea(self.store.as_ref(), &target)?;
            if idea.is_duplicate() {
                // merged away after we resolved it
                return Err(EngineError::Contention {
                    key: target.to_string(),
                });
            }

            let changed = if subscribe {
                idea.subscriber_ids.insert(user_id.clone())
            } else {
                idea.subscriber_ids.remove(user_id)
            };
            let subscriber_count = idea.subscriber_count();

            if changed {
                idea.updated_at = Utc::now();
                let mut batch = WriteBatch::new();
                batch.put_idea(idea);
                self.store.commit(batch)?;
                info!(
                    idea = %target,
                    user = %user_id,
                    subscribe,
                    subscribers = subscriber_count,
                    "subscription changed"
                );
            } else {
                debug!(idea = %target, user = %user_id, subscribe, "subscription unchanged");
            }

            Ok(SubscriptionReceipt {
                idea_id: target.clone(),
                user_id: user_id.clone(),
                subscriber_count,
                changed,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::FeedbackPortal;
    use pulse_types::IdeaCategory;

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let portal = FeedbackPortal::in_memory();
        let idea = portal.submit_idea("Webhooks", IdeaCategory::Integration).unwrap();
        let subs = portal.subscriptions();
        let user = UserId::new("u1");

        let receipt = subs.subscribe(&idea.id, &user).unwrap();
        assert!(receipt.changed);
        assert_eq!(receipt.subscriber_count, 1);

        let again = subs.subscribe(&idea.id, &user).unwrap();
        assert!(!again.changed);
        assert_eq!(again.subscriber_count, 1);
        assert!(subs.subscribers(&idea.id).unwrap().contains(&user));

        let gone = subs.unsubscribe(&idea.id, &user).unwrap();
        assert!(gone.changed);
        assert_eq!(gone.subscriber_count, 0);
        assert!(!subs.unsubscribe(&idea.id, &user).unwrap().changed);
    }

    #[test]
    fn test_subscriptions_leave_votes_alone() {
        let portal = FeedbackPortal::in_memory();
        let idea = portal.submit_idea("Dark mode", IdeaCategory::Ux).unwrap();
        let ledger = portal.ledger();
        ledger.cast_segment_vote(&idea.id, &UserId::new("u1")).unwrap();
        let before = ledger.tally(&idea.id).unwrap();

        portal
            .subscriptions()
            .subscribe(&idea.id, &UserId::new("u2"))
            .unwrap();
        assert_eq!(ledger.tally(&idea.id).unwrap(), before);
    }

    #[test]
    fn test_merged_idea_redirects_to_primary() {
        let portal = FeedbackPortal::in_memory();
        let primary = portal.submit_idea("Dark mode", IdeaCategory::Ux).unwrap();
        let duplicate = portal.submit_idea("Night theme", IdeaCategory::Ux).unwrap();
        let subs = portal.subscriptions();
        let shared = UserId::new("shared");
        subs.subscribe(&primary.id, &shared).unwrap();
        subs.subscribe(&duplicate.id, &shared).unwrap();
        subs.subscribe(&duplicate.id, &UserId::new("u2")).unwrap();

        portal
            .merger()
            .merge(&primary.id, &[duplicate.id.clone()], None)
            .unwrap();
        assert_eq!(portal.idea(&primary.id).unwrap().subscriber_count(), 2);

        let receipt = subs.subscribe(&duplicate.id, &UserId::new("u3")).unwrap();
        assert_eq!(receipt.idea_id, primary.id);
        assert_eq!(receipt.subscriber_count, 3);
        assert!(portal.idea(&duplicate.id).unwrap().subscriber_ids.is_empty());
        assert_eq!(subs.subscribers(&duplicate.id).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_idea() {
        let portal = FeedbackPortal::in_memory();
        assert!(matches!(
            portal
                .subscriptions()
                .subscribe(&IdeaId::new("missing"), &UserId::new("u1")),
            Err(EngineError::NotFound(_))
        ));
    }
}
