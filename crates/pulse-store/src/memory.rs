//! In-memory record store for development and testing.
//!
//! All tables sit behind one `RwLock`, so a committed batch is visible
//! to readers in full or not at all.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::RwLock;

use pulse_types::{Idea, IdeaId, UserId, Vote};
use tracing::trace;

use crate::{FeedbackStore, StoreError, StoreResult, WriteBatch, WriteOp};

#[derive(Default)]
struct Tables {
    ideas: HashMap<IdeaId, Idea>,
    /// Votes grouped by idea, keyed by voter
    votes: HashMap<IdeaId, BTreeMap<UserId, Vote>>,
    /// Ideas each user currently holds a vote on
    by_user: HashMap<UserId, BTreeSet<IdeaId>>,
}

impl Tables {
    fn validate(&self, batch: &WriteBatch) -> StoreResult<()> {
        let mut staged: HashSet<&IdeaId> = HashSet::new();
        for op in batch.ops() {
            match op {
                WriteOp::PutIdea(idea) => {
                    staged.insert(&idea.id);
                }
                WriteOp::PutVote(vote) => {
                    if !self.ideas.contains_key(&vote.idea_id) && !staged.contains(&vote.idea_id) {
                        return Err(StoreError::DanglingVote(vote.idea_id.to_string()));
                    }
                }
                WriteOp::RemoveVote { .. } => {}
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::PutIdea(idea) => {
                self.ideas.insert(idea.id.clone(), idea);
            }
            WriteOp::PutVote(vote) => {
                self.by_user
                    .entry(vote.user_id.clone())
                    .or_default()
                    .insert(vote.idea_id.clone());
                self.votes
                    .entry(vote.idea_id.clone())
                    .or_default()
                    .insert(vote.user_id.clone(), vote);
            }
            WriteOp::RemoveVote { idea_id, user_id } => {
                if let Some(votes) = self.votes.get_mut(&idea_id) {
                    votes.remove(&user_id);
                    if votes.is_empty() {
                        self.votes.remove(&idea_id);
                    }
                }
                if let Some(ideas) = self.by_user.get_mut(&user_id) {
                    ideas.remove(&idea_id);
                    if ideas.is_empty() {
                        self.by_user.remove(&user_id);
                    }
                }
            }
        }
    }
}

/// In-memory feedback store implementation.
pub struct InMemoryFeedbackStore {
    tables: RwLock<Tables>,
}

impl InMemoryFeedbackStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Number of ideas stored
    pub fn idea_count(&self) -> StoreResult<usize> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.ideas.len())
    }

    /// Number of active votes across all ideas
    pub fn vote_count(&self) -> StoreResult<usize> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.votes.values().map(BTreeMap::len).sum())
    }
}

impl Default for InMemoryFeedbackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackStore for InMemoryFeedbackStore {
    fn get_idea(&self, id: &IdeaId) -> StoreResult<Option<Idea>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.ideas.get(id).cloned())
    }

    fn list_ideas(&self) -> StoreResult<Vec<Idea>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.ideas.values().cloned().collect())
    }

    fn get_vote(&self, idea_id: &IdeaId, user_id: &UserId) -> StoreResult<Option<Vote>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables
            .votes
            .get(idea_id)
            .and_then(|votes| votes.get(user_id))
            .cloned())
    }

    fn votes_for(&self, idea_id: &IdeaId) -> StoreResult<Vec<Vote>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables
            .votes
            .get(idea_id)
            .map(|votes| votes.values().cloned().collect())
            .unwrap_or_default())
    }

    fn idea_with_votes(&self, id: &IdeaId) -> StoreResult<Option<(Idea, Vec<Vote>)>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        let Some(idea) = tables.ideas.get(id) else {
            return Ok(None);
        };

        let votes = tables
            .votes
            .get(id)
            .map(|votes| votes.values().cloned().collect())
            .unwrap_or_default();
        Ok(Some((idea.clone(), votes)))
    }

    fn votes_by_user(&self, user_id: &UserId) -> StoreResult<Vec<Vote>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        let Some(ideas) = tables.by_user.get(user_id) else {
            return Ok(vec![]);
        };

        Ok(ideas
            .iter()
            .filter_map(|idea_id| tables.votes.get(idea_id)?.get(user_id).cloned())
            .collect())
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        tables.validate(&batch)?;

        let ops = batch.len();
        for op in batch.into_ops() {
            tables.apply(op);
        }
        trace!(ops, "committed write batch");

        Ok(())
    }
}
