//! The exchange: one table, many topics.

use std::fmt;
use std::sync::Arc;

use repubsub_core::{MessageStore, UpsertRequest};
use repubsub_proto::{Payload, TopicPredicate, TopicValue};

use crate::config::ExchangeConfig;
use crate::error::Error;
use crate::queue::Queue;
use crate::token::{ChangeTokenSource, RandomTokens};
use crate::topic::Topic;

/// A publish/subscribe exchange bound to one table in a message store.
///
/// Each distinct topic value owns exactly one document in the table. A
/// publish overwrites that document with the new payload and a fresh change
/// token, so the store emits one change notification per publish even when
/// the payload repeats.
///
/// Cloning is cheap; clones share the store and token source.
pub struct Exchange<S: MessageStore + ?Sized> {
    inner: Arc<ExchangeInner<S>>,
}

struct ExchangeInner<S: MessageStore + ?Sized> {
    table: String,
    tokens: Arc<dyn ChangeTokenSource>,
    store: Arc<S>,
}

impl<S: MessageStore + ?Sized> Exchange<S> {
    /// Open an exchange on `store` with random change tokens.
    pub async fn open(store: Arc<S>, config: ExchangeConfig) -> Result<Self, Error> {
        Self::open_with_tokens(store, config, Arc::new(RandomTokens)).await
    }

    /// Open an exchange with an explicit change token source.
    pub async fn open_with_tokens(
        store: Arc<S>,
        config: ExchangeConfig,
        tokens: Arc<dyn ChangeTokenSource>,
    ) -> Result<Self, Error> {
        if config.create_table {
            store.ensure_table(&config.table).await?;
        }

        tracing::debug!(exchange = %config.table, "exchange opened");

        Ok(Self {
            inner: Arc::new(ExchangeInner {
                table: config.table,
                tokens,
                store,
            }),
        })
    }

    /// Name of the exchange (its table).
    pub fn name(&self) -> &str {
        &self.inner.table
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// Publish `payload` to `topic`.
    ///
    /// Creates the topic's document on first publish and overwrites it
    /// afterwards, as a single atomic upsert in the store.
    pub async fn publish(
        &self,
        topic: impl Into<TopicValue>,
        payload: Payload,
    ) -> Result<(), Error> {
        let topic = topic.into();
        let force_change_token = self.inner.tokens.next_token();

        let outcome = self
            .inner
            .store
            .upsert(
                &self.inner.table,
                UpsertRequest {
                    topic,
                    payload,
                    force_change_token,
                },
            )
            .await
            .map_err(|e| {
                tracing::debug!(exchange = %self.inner.table, error = %e, "publish failed");
                Error::from(e)
            })?;

        tracing::debug!(
            exchange = %self.inner.table,
            topic = %outcome.document.topic,
            seq = outcome.seq,
            created = outcome.created,
            "published message"
        );

        Ok(())
    }

    /// Get a publish handle bound to one topic value.
    pub fn topic(&self, value: impl Into<TopicValue>) -> Topic<S> {
        Topic::new(self.clone(), value.into())
    }

    /// Get a subscribe handle for topics matching `predicate`.
    pub fn queue(&self, predicate: TopicPredicate) -> Queue<S> {
        Queue::new(self.clone(), predicate)
    }
}

impl<S: MessageStore + ?Sized> Clone for Exchange<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: MessageStore + ?Sized> fmt::Debug for Exchange<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("table", &self.inner.table)
            .finish_non_exhaustive()
    }
}
