//! The message store boundary.
//!
//! The exchange only needs two things from a store: an atomic upsert keyed by
//! topic, and a live change feed filtered on the store side. `MessageStore`
//! captures exactly that, plus the point reads used for verification.

use async_trait::async_trait;

use repubsub_proto::{ChangeToken, MessageDocument, Payload, TopicPredicate, TopicValue};

use crate::changefeed::ChangeFeed;
use crate::error::StoreError;

/// A write targeting the document for `topic`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRequest {
    pub topic: TopicValue,
    pub payload: Payload,
    pub force_change_token: ChangeToken,
}

/// Result of an upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    /// The document as stored.
    pub document: MessageDocument,
    /// True if the topic had no document before this write.
    pub created: bool,
    /// Sequence number of the change event emitted for this write.
    pub seq: u64,
}

/// A document table with upsert-by-topic and filtered change feeds.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Create `table` if it does not exist.
    async fn ensure_table(&self, table: &str) -> Result<(), StoreError>;

    /// Create or overwrite the document whose topic equals `request.topic`.
    ///
    /// The write and the change event it emits are atomic with respect to
    /// other writes to the same topic.
    async fn upsert(&self, table: &str, request: UpsertRequest)
        -> Result<UpsertOutcome, StoreError>;

    /// Open a change feed on `table`, filtered by `predicate` on the store side.
    async fn watch_changes(
        &self,
        table: &str,
        predicate: Option<TopicPredicate>,
    ) -> Result<ChangeFeed, StoreError>;

    /// Get the current document for `topic`.
    async fn fetch(
        &self,
        table: &str,
        topic: &TopicValue,
    ) -> Result<Option<MessageDocument>, StoreError>;

    /// Number of documents (distinct topics) in `table`.
    async fn count(&self, table: &str) -> Result<usize, StoreError>;

    /// Stop accepting work and terminate every open feed.
    async fn shutdown(&self) -> Result<(), StoreError>;
}
