//! Write batches

use pulse_types::{Idea, IdeaId, UserId, Vote};

/// A single write inside a batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or replace an idea
    PutIdea(Idea),
    /// Insert or replace the vote for (idea, user)
    PutVote(Vote),
    /// Remove the vote for (idea, user) if present
    RemoveVote { idea_id: IdeaId, user_id: UserId },
}

/// Ordered set of writes committed atomically
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_idea(&mut self, idea: Idea) -> &mut Self {
        self.ops.push(WriteOp::PutIdea(idea));
        self
    }

    pub fn put_vote(&mut self, vote: Vote) -> &mut Self {
        self.ops.push(WriteOp::PutVote(vote));
        self
    }

    pub fn remove_vote(&mut self, idea_id: IdeaId, user_id: UserId) -> &mut Self {
        self.ops.push(WriteOp::RemoveVote { idea_id, user_id });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}
