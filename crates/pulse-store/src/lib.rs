//! Pulse record store
//!
//! The engine never talks to a database directly. It reads ideas and
//! votes through [`FeedbackStore`] and writes them back as a single
//! [`WriteBatch`], which a backend must apply all-or-nothing.
//!
//! [`InMemoryFeedbackStore`] is the bundled backend for development and
//! tests.

#![deny(unsafe_code)]

mod batch;
mod error;
mod memory;

pub use batch::{WriteBatch, WriteOp};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryFeedbackStore;

use pulse_types::{Idea, IdeaId, UserId, Vote};

/// Record store for ideas and their votes
pub trait FeedbackStore: Send + Sync {
    /// Get an idea by ID
    fn get_idea(&self, id: &IdeaId) -> StoreResult<Option<Idea>>;

    /// List every idea, in no particular order
    fn list_ideas(&self) -> StoreResult<Vec<Idea>>;

    /// Get the active vote of `user_id` on `idea_id`
    fn get_vote(&self, idea_id: &IdeaId, user_id: &UserId) -> StoreResult<Option<Vote>>;

    /// All active votes on an idea
    fn votes_for(&self, idea_id: &IdeaId) -> StoreResult<Vec<Vote>>;

    /// An idea together with its active votes, read as one snapshot.
    ///
    /// No commit may land between reading the idea and reading its votes.
    fn idea_with_votes(&self, id: &IdeaId) -> StoreResult<Option<(Idea, Vec<Vote>)>>;

    /// All active votes held by a user, across ideas
    fn votes_by_user(&self, user_id: &UserId) -> StoreResult<Vec<Vote>>;

    /// Apply every operation in the batch, or none of them
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}
