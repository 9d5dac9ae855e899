//! Live subscriptions.
//!
//! A subscription wraps one store change feed and decodes each change into
//! the `(topic, payload)` pair the publisher wrote. It moves from streaming
//! to closed either when its owner closes it or when the feed is lost; the
//! latter surfaces as [`Error::StreamInterrupted`], never as a silent end.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use repubsub_core::ChangeFeed;
use repubsub_proto::{FeedItem, Message};

use crate::error::Error;

/// A predicate that failed to evaluate against one published document.
///
/// The document is treated as non-matching; the subscription continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateWarning {
    /// Store sequence number of the offending write.
    pub seq: u64,
    /// Evaluation error reported by the store.
    pub reason: String,
}

/// An item observed on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// A matching message.
    Message(Message),
    /// The predicate could not be evaluated for one write.
    Warning(PredicateWarning),
}

/// Counters for one subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    pub messages: u64,
    pub warnings: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    Interrupted,
    Closed,
}

/// An open, unbounded stream of matching messages.
///
/// Dropping the subscription releases its change feed, as does `close`.
#[derive(Debug)]
pub struct Subscription {
    feed: ChangeFeed,
    state: State,
    stats: SubscriptionStats,
}

impl Subscription {
    pub(crate) fn new(feed: ChangeFeed) -> Self {
        Self {
            feed,
            state: State::Streaming,
            stats: SubscriptionStats::default(),
        }
    }

    /// Wait for the next matching message.
    ///
    /// Predicate warnings are logged and skipped; use [`recv_event`] to see
    /// them.
    ///
    /// [`recv_event`]: Subscription::recv_event
    pub async fn recv(&mut self) -> Result<Message, Error> {
        loop {
            if let QueueEvent::Message(message) = self.recv_event().await? {
                return Ok(message);
            }
        }
    }

    /// Wait for the next message or predicate warning.
    pub async fn recv_event(&mut self) -> Result<QueueEvent, Error> {
        self.check_streaming()?;

        match self.feed.recv().await {
            Some(item) => Ok(self.decode(item)),
            None => Err(self.interrupt()),
        }
    }

    /// Close the subscription and release its change feed.
    pub fn close(&mut self) {
        if self.state == State::Streaming {
            self.state = State::Closed;
        }
        self.feed.close();

        tracing::debug!(
            watch_id = self.feed.id(),
            messages = self.stats.messages,
            warnings = self.stats.warnings,
            "subscription closed"
        );
    }

    /// Whether the subscription has stopped streaming.
    pub fn is_closed(&self) -> bool {
        self.state != State::Streaming
    }

    /// Message and warning counts so far.
    pub fn stats(&self) -> SubscriptionStats {
        self.stats
    }

    fn check_streaming(&self) -> Result<(), Error> {
        match self.state {
            State::Streaming => Ok(()),
            State::Closed => Err(Error::SubscriptionClosed),
            State::Interrupted => Err(Error::StreamInterrupted(format!(
                "change feed on {} already lost",
                self.feed.table()
            ))),
        }
    }

    fn interrupt(&mut self) -> Error {
        self.state = State::Interrupted;
        tracing::warn!(
            watch_id = self.feed.id(),
            table = %self.feed.table(),
            "change feed lost"
        );
        Error::StreamInterrupted(format!("change feed on {} ended", self.feed.table()))
    }

    fn decode(&mut self, item: FeedItem) -> QueueEvent {
        match item {
            FeedItem::Change(event) => {
                self.stats.messages += 1;
                QueueEvent::Message(event.into_message())
            }
            FeedItem::PredicateFailed(failure) => {
                self.stats.warnings += 1;
                tracing::warn!(
                    watch_id = self.feed.id(),
                    table = %failure.table,
                    seq = failure.seq,
                    reason = %failure.reason,
                    "subscription predicate failed; message skipped"
                );
                QueueEvent::Warning(PredicateWarning {
                    seq: failure.seq,
                    reason: failure.reason,
                })
            }
        }
    }
}

impl Stream for Subscription {
    type Item = Result<Message, Error>;

    /// Yields `Err(StreamInterrupted)` once if the feed is lost, then ends.
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.state != State::Streaming {
                return Poll::Ready(None);
            }

            match this.feed.poll_recv(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(Some(Err(this.interrupt()))),
                Poll::Ready(Some(item)) => {
                    if let QueueEvent::Message(message) = this.decode(item) {
                        return Poll::Ready(Some(Ok(message)));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use repubsub_proto::{
        ChangeEvent, ChangeToken, DocumentId, MessageDocument, PredicateFailure, TopicValue,
    };
    use serde_json::json;
    use tokio::sync::mpsc;

    fn change(seq: u64, topic: &str) -> FeedItem {
        FeedItem::Change(ChangeEvent {
            seq,
            table: "messages".into(),
            old_value: None,
            new_value: MessageDocument {
                id: DocumentId([0u8; 16]),
                topic: TopicValue::from(topic),
                payload: json!({"seq": seq}),
                force_change_token: ChangeToken(seq.to_string()),
            },
        })
    }

    fn failure(seq: u64) -> FeedItem {
        FeedItem::PredicateFailed(PredicateFailure {
            seq,
            table: "messages".into(),
            reason: "matches expects a string topic, got tags".into(),
        })
    }

    fn subscription() -> (mpsc::UnboundedSender<FeedItem>, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Subscription::new(ChangeFeed::new(1, "messages", rx, || {})))
    }

    #[tokio::test]
    async fn test_decodes_topic_and_payload() {
        let (tx, mut sub) = subscription();
        tx.send(change(1, "a.b")).unwrap();

        let message = sub.recv().await.unwrap();
        assert_eq!(message.topic, TopicValue::from("a.b"));
        assert_eq!(message.payload, json!({"seq": 1}));
    }

    #[tokio::test]
    async fn test_warnings_skipped_by_recv() {
        let (tx, mut sub) = subscription();
        tx.send(failure(1)).unwrap();
        tx.send(change(2, "a")).unwrap();

        let message = sub.recv().await.unwrap();
        assert_eq!(message.payload, json!({"seq": 2}));
        assert_eq!(sub.stats(), SubscriptionStats { messages: 1, warnings: 1 });
    }

    #[tokio::test]
    async fn test_warnings_visible_through_recv_event() {
        let (tx, mut sub) = subscription();
        tx.send(failure(4)).unwrap();

        match sub.recv_event().await.unwrap() {
            QueueEvent::Warning(w) => assert_eq!(w.seq, 4),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lost_feed_is_interruption() {
        let (tx, mut sub) = subscription();
        drop(tx);

        assert!(matches!(sub.recv().await, Err(Error::StreamInterrupted(_))));
        assert!(sub.is_closed());
        assert!(matches!(sub.recv().await, Err(Error::StreamInterrupted(_))));
    }

    #[tokio::test]
    async fn test_close_is_not_interruption() {
        let (_tx, mut sub) = subscription();
        sub.close();

        assert!(sub.is_closed());
        assert!(matches!(sub.recv().await, Err(Error::SubscriptionClosed)));
    }

    #[tokio::test]
    async fn test_stream_impl() {
        let (tx, mut sub) = subscription();
        tx.send(change(1, "x")).unwrap();
        tx.send(failure(2)).unwrap();
        tx.send(change(3, "y")).unwrap();
        drop(tx);

        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.topic, TopicValue::from("x"));
        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.topic, TopicValue::from("y"));
        assert!(matches!(
            sub.next().await,
            Some(Err(Error::StreamInterrupted(_)))
        ));
        assert!(sub.next().await.is_none());
    }
}
