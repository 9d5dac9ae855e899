//! Subscribe-side queue handle.

use repubsub_core::MessageStore;
use repubsub_proto::TopicPredicate;

use crate::error::Error;
use crate::exchange::Exchange;
use crate::subscription::Subscription;

/// A subscriber's interest in an exchange: a predicate over topic values.
pub struct Queue<S: MessageStore + ?Sized> {
    exchange: Exchange<S>,
    predicate: TopicPredicate,
}

impl<S: MessageStore + ?Sized> Queue<S> {
    pub(crate) fn new(exchange: Exchange<S>, predicate: TopicPredicate) -> Self {
        Self {
            exchange,
            predicate,
        }
    }

    /// The predicate this queue filters on.
    pub fn predicate(&self) -> &TopicPredicate {
        &self.predicate
    }

    /// Open a live subscription.
    ///
    /// The predicate is pushed down to the store, which evaluates it against
    /// the topic of every new document before anything is sent. Delivery is
    /// at most once: messages published while no subscription is open are
    /// never seen by this queue. Each call opens an independent stream.
    pub async fn subscribe(&self) -> Result<Subscription, Error> {
        let pushed_down = match &self.predicate {
            TopicPredicate::Any => None,
            other => Some(other.clone()),
        };

        let feed = self
            .exchange
            .store()
            .watch_changes(self.exchange.name(), pushed_down)
            .await?;

        tracing::debug!(
            exchange = %self.exchange.name(),
            watch_id = feed.id(),
            predicate = ?self.predicate,
            "subscription opened"
        );

        Ok(Subscription::new(feed))
    }
}

impl<S: MessageStore + ?Sized> Clone for Queue<S> {
    fn clone(&self) -> Self {
        Self {
            exchange: self.exchange.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

impl<S: MessageStore + ?Sized> std::fmt::Debug for Queue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("exchange", &self.exchange.name())
            .field("predicate", &self.predicate)
            .finish()
    }
}
