//! Watcher tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use repubsub_proto::FeedItem;

use crate::predicate::CompiledPredicate;

/// An active watcher on one table.
#[derive(Debug)]
pub struct WatcherEntry {
    /// Unique watcher ID.
    pub id: u64,
    /// Table being watched.
    pub table: String,
    /// Pushed-down predicate. None forwards every write.
    pub predicate: Option<CompiledPredicate>,
    /// When the watcher was registered.
    pub created_at: Instant,
    sender: mpsc::UnboundedSender<FeedItem>,
    events_sent: AtomicU64,
    failures: AtomicU64,
}

impl WatcherEntry {
    /// Create a new watcher entry.
    pub fn new(
        id: u64,
        table: impl Into<String>,
        predicate: Option<CompiledPredicate>,
        sender: mpsc::UnboundedSender<FeedItem>,
    ) -> Self {
        Self {
            id,
            table: table.into(),
            predicate,
            created_at: Instant::now(),
            sender,
            events_sent: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Get the age of this watcher.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Number of change events forwarded.
    pub fn events_sent(&self) -> u64 {
        self.events_sent.load(Ordering::Relaxed)
    }

    /// Number of predicate evaluation failures.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Forward an item. Returns false if the receiving side is gone.
    pub(crate) fn send(&self, item: FeedItem) -> bool {
        match &item {
            FeedItem::Change(_) => self.events_sent.fetch_add(1, Ordering::Relaxed),
            FeedItem::PredicateFailed(_) => self.failures.fetch_add(1, Ordering::Relaxed),
        };
        self.sender.send(item).is_ok()
    }
}
