//! Pulse Engine
//!
//! Idea lifecycle and voting aggregation for the feedback portal.
//!
//! # Units
//!
//! - [`VoteLedger`]: one active vote per (idea, user); `vote_count` always
//!   equals the sum of active vote weights.
//! - [`StatusWorkflow`]: the allowed-transition graph over [`IdeaStatus`].
//! - [`MergeCoordinator`]: folds duplicates into a primary without double
//!   counting shared voters.
//! - [`NpsAggregator`]: promoter/passive/detractor buckets and the
//!   composite score.
//! - [`Subscriptions`]: who follows an idea; merges redirect followers.
//!
//! All mutations on an idea are serialized through [`IdeaLocks`]. Lock
//! waits are bounded; on timeout the caller gets
//! [`EngineError::Contention`] and may retry.
//!
//! [`IdeaStatus`]: pulse_types::IdeaStatus

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod merge;
pub mod nps;
pub mod portal;
pub mod subscriptions;
pub mod telemetry;
pub mod weights;
pub mod workflow;

pub use config::{EngineConfig, LockingConfig, VotingConfig, WeightingConfig};
pub use error::{EngineError, EngineResult};
pub use ledger::{ResetReceipt, Tally, VoteAudit, VoteLedger, VoteReceipt};
pub use locks::{IdeaLocks, LockKey};
pub use merge::{MergeCoordinator, MergeReceipt};
pub use nps::{NpsAggregator, NpsBand, NpsSummary, SegmentNps};
pub use portal::FeedbackPortal;
pub use subscriptions::{SubscriptionReceipt, Subscriptions};
pub use weights::{PlanWeights, UniformWeights, WeightProvider};
pub use workflow::{StatusWorkflow, TransitionReceipt};

use pulse_store::FeedbackStore;
use pulse_types::{Idea, IdeaId};

pub(crate) fn load_idea(store: &dyn FeedbackStore, id: &IdeaId) -> EngineResult<Idea> {
    store
        .get_idea(id)?
        .ok_or_else(|| EngineError::NotFound(id.clone()))
}
