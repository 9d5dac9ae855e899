//! Change-feed items emitted by the store.

use serde::{Deserialize, Serialize};

use crate::document::{Message, MessageDocument};

/// A single insert or update observed on a watched table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Per-table sequence number assigned by the store.
    pub seq: u64,
    /// Table the write landed in.
    pub table: String,
    /// Document before the write (None for insert).
    pub old_value: Option<MessageDocument>,
    /// Document after the write.
    pub new_value: MessageDocument,
}

impl ChangeEvent {
    /// Whether this event created the topic's document.
    pub fn is_insert(&self) -> bool {
        self.old_value.is_none()
    }

    /// Project the new value down to `(topic, payload)`.
    pub fn into_message(self) -> Message {
        self.new_value.into_message()
    }
}

/// A predicate could not be evaluated against one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateFailure {
    /// Sequence number of the event that failed evaluation.
    pub seq: u64,
    /// Table the event belongs to.
    pub table: String,
    /// Human-readable evaluation error.
    pub reason: String,
}

/// An item delivered on a change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedItem {
    /// A write that satisfied the watcher's predicate.
    Change(ChangeEvent),
    /// A write the watcher's predicate failed to evaluate against.
    PredicateFailed(PredicateFailure),
}
