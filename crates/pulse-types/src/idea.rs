//! Ideas and their workflow status

use crate::{IdeaId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Workflow status of an idea
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    /// Just submitted, nobody has looked at it yet
    #[default]
    New,
    UnderReview,
    Planned,
    InProgress,
    Shipped,
    Declined,
    /// Folded into another idea by a merge
    Duplicate,
}

impl IdeaStatus {
    pub const ALL: [IdeaStatus; 7] = [
        IdeaStatus::New,
        IdeaStatus::UnderReview,
        IdeaStatus::Planned,
        IdeaStatus::InProgress,
        IdeaStatus::Shipped,
        IdeaStatus::Declined,
        IdeaStatus::Duplicate,
    ];

    /// Terminal states are never left once entered
    pub fn is_terminal(&self) -> bool {
        matches!(self, IdeaStatus::Shipped | IdeaStatus::Duplicate)
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IdeaStatus::New => "new",
            IdeaStatus::UnderReview => "under_review",
            IdeaStatus::Planned => "planned",
            IdeaStatus::InProgress => "in_progress",
            IdeaStatus::Shipped => "shipped",
            IdeaStatus::Declined => "declined",
            IdeaStatus::Duplicate => "duplicate",
        };
        write!(f, "{}", s)
    }
}

/// What kind of request an idea is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdeaCategory {
    #[default]
    Feature,
    Improvement,
    Bug,
    Integration,
    Ux,
    Performance,
    Other,
}

/// One applied status change
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: IdeaStatus,
    pub to: IdeaStatus,
    pub at: DateTime<Utc>,
}

/// A feedback item tracked through the status workflow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub id: IdeaId,
    pub title: String,
    pub category: IdeaCategory,
    pub status: IdeaStatus,
    /// Authoritative weighted tally; equals the sum of active vote weights
    pub vote_count: Decimal,
    /// Users holding an active vote on this idea
    pub voter_ids: BTreeSet<UserId>,
    /// Users notified about changes to this idea
    #[serde(default)]
    pub subscriber_ids: BTreeSet<UserId>,
    /// Primary idea this one was merged into; set iff status is `Duplicate`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_into: Option<IdeaId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_reason: Option<String>,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Idea {
    /// A fresh idea in `New` with no votes
    pub fn new(title: impl Into<String>, category: IdeaCategory) -> Self {
        Self::with_id(IdeaId::generate(), title, category)
    }

    pub fn with_id(id: IdeaId, title: impl Into<String>, category: IdeaCategory) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            category,
            status: IdeaStatus::New,
            vote_count: Decimal::ZERO,
            voter_ids: BTreeSet::new(),
            subscriber_ids: BTreeSet::new(),
            merged_into: None,
            merge_reason: None,
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_subscribers(mut self, users: impl IntoIterator<Item = UserId>) -> Self {
        self.subscriber_ids.extend(users);
        self
    }

    pub fn subscriber_count(&self) -> u64 {
        self.subscriber_ids.len() as u64
    }

    pub fn is_duplicate(&self) -> bool {
        self.status == IdeaStatus::Duplicate
    }

    /// Move to `to`, recording the change and refreshing `updated_at`.
    ///
    /// Does not validate the edge; callers own the workflow rules.
    pub fn record_status(&mut self, to: IdeaStatus, at: DateTime<Utc>) {
        self.status_history.push(StatusChange {
            from: self.status,
            to,
            at,
        });
        self.status = to;
        self.updated_at = at;
    }

    /// Whether the duplicate/merged_into pairing holds for this record alone
    pub fn merge_fields_consistent(&self) -> bool {
        self.is_duplicate() == self.merged_into.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_idea_starts_clean() {
        let idea = Idea::new("Dark mode support", IdeaCategory::Ux);
        assert_eq!(idea.status, IdeaStatus::New);
        assert_eq!(idea.vote_count, Decimal::ZERO);
        assert!(idea.voter_ids.is_empty());
        assert_eq!(idea.subscriber_count(), 0);
        assert!(idea.merged_into.is_none());
        assert!(idea.merge_fields_consistent());
        assert_eq!(idea.created_at, idea.updated_at);
    }

    #[test]
    fn test_subscribers_are_a_set() {
        let idea = Idea::new("Webhooks", IdeaCategory::Integration)
            .with_subscribers([UserId::new("u1"), UserId::new("u2"), UserId::new("u1")]);
        assert_eq!(idea.subscriber_count(), 2);

        let mut legacy = serde_json::to_value(&idea).unwrap();
        legacy.as_object_mut().unwrap().remove("subscriber_ids");
        let restored: Idea = serde_json::from_value(legacy).unwrap();
        assert_eq!(restored.subscriber_count(), 0);
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = IdeaStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .copied()
            .collect();
        assert_eq!(terminal, vec![IdeaStatus::Shipped, IdeaStatus::Duplicate]);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&IdeaStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
        assert_eq!(IdeaStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn test_record_status_appends_history() {
        let mut idea = Idea::new("Webhooks", IdeaCategory::Integration);
        let at = Utc::now();
        idea.record_status(IdeaStatus::UnderReview, at);

        assert_eq!(idea.status, IdeaStatus::UnderReview);
        assert_eq!(idea.updated_at, at);
        assert_eq!(
            idea.status_history,
            vec![StatusChange {
                from: IdeaStatus::New,
                to: IdeaStatus::UnderReview,
                at,
            }]
        );
    }
}
