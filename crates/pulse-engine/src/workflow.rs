//! Status workflow.
//!
//! ```text
//! new ─► under_review ─► planned ─► in_progress ─► shipped
//!  │          │                          │
//!  └──────────┴───────► declined ◄───────┘
//! ```
//!
//! `duplicate` is entered only through a merge, from any state that is not
//! terminal. Nothing leaves `shipped` or `duplicate`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pulse_store::{FeedbackStore, WriteBatch};
use pulse_types::{IdeaId, IdeaStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::load_idea;
use crate::locks::{IdeaLocks, LockKey};

/// Whether a caller may move an idea from `from` to `to` directly
pub fn is_allowed(from: IdeaStatus, to: IdeaStatus) -> bool {
    use IdeaStatus::*;
    matches!(
        (from, to),
        (New, UnderReview)
            | (New, Declined)
            | (UnderReview, Planned)
            | (UnderReview, Declined)
            | (Planned, InProgress)
            | (InProgress, Shipped)
            | (InProgress, Declined)
    )
}

/// Whether an idea in `status` may be folded into another by a merge
pub fn can_become_duplicate(status: IdeaStatus) -> bool {
    !status.is_terminal()
}

/// User-invocable successors of a state
pub fn allowed_targets(from: IdeaStatus) -> Vec<IdeaStatus> {
    IdeaStatus::ALL
        .into_iter()
        .filter(|to| is_allowed(from, *to))
        .collect()
}

/// Outcome of a transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReceipt {
    pub idea_id: IdeaId,
    pub from: IdeaStatus,
    pub status: IdeaStatus,
    pub updated_at: DateTime<Utc>,
}

/// Applies status transitions
#[derive(Clone)]
pub struct StatusWorkflow {
    store: Arc<dyn FeedbackStore>,
    locks: Arc<IdeaLocks>,
}

impl StatusWorkflow {
    pub fn new(store: Arc<dyn FeedbackStore>, locks: Arc<IdeaLocks>) -> Self {
        Self { store, locks }
    }

    /// Move an idea to `target`.
    ///
    /// Only status, history and `updated_at` change.
    pub fn transition(
        &self,
        idea_id: &IdeaId,
        target: IdeaStatus,
    ) -> EngineResult<TransitionReceipt> {
        self.locks.with_locked([LockKey::Idea(idea_id.clone())], || {
            let mut idea = load_idea(self.store.as_ref(), idea_id)?;
            let from = idea.status;
            if !is_allowed(from, target) {
                return Err(EngineError::InvalidTransition {
                    idea_id: idea_id.clone(),
                    from,
                    to: target,
                });
            }

            let now = Utc::now();
            idea.record_status(target, now);

            let mut batch = WriteBatch::new();
            batch.put_idea(idea);
            self.store.commit(batch)?;

            info!(idea = %idea_id, %from, to = %target, "status changed");
            Ok(TransitionReceipt {
                idea_id: idea_id.clone(),
                from,
                status: target,
                updated_at: now,
            })
        })
    }

    pub fn allowed_targets(&self, from: IdeaStatus) -> Vec<IdeaStatus> {
        allowed_targets(from)
    }
}
