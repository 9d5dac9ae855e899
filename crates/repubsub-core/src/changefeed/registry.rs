//! Registry of watchers and store-side dispatch of change events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use repubsub_proto::{ChangeEvent, FeedItem, PredicateFailure, TopicPredicate};

use super::{ChangeFeed, WatcherEntry};
use crate::error::StoreError;
use crate::predicate::CompiledPredicate;

/// Registry of change-feed watchers.
///
/// Predicates are evaluated here, on the store side of the boundary, so a
/// watcher only ever receives writes that matched (or failed to evaluate).
pub struct FeedRegistry {
    /// Active watchers keyed by watcher ID.
    watchers: RwLock<HashMap<u64, WatcherEntry>>,
    /// Index of watchers by table.
    table_index: RwLock<HashMap<String, Vec<u64>>>,
    /// Next watcher ID.
    next_watch_id: AtomicU64,
    /// Set once the store shuts down; no further registrations.
    closed: AtomicBool,
}

impl FeedRegistry {
    /// Create a new registry.
    pub fn new() -> Self {
        Self {
            watchers: RwLock::new(HashMap::new()),
            table_index: RwLock::new(HashMap::new()),
            next_watch_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a watcher on `table` and return its feed.
    pub fn register(
        self: &Arc<Self>,
        table: &str,
        predicate: Option<TopicPredicate>,
    ) -> Result<ChangeFeed, StoreError> {
        let id = self.next_watch_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        let entry = WatcherEntry::new(id, table, predicate.map(CompiledPredicate::new), tx);

        {
            let mut watchers = self.watchers.write();
            if self.closed.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("store is shut down".to_string()));
            }
            watchers.insert(id, entry);
        }

        {
            let mut index = self.table_index.write();
            index.entry(table.to_string()).or_default().push(id);
        }

        tracing::debug!(watch_id = id, table, "watcher registered");

        let registry: Weak<FeedRegistry> = Arc::downgrade(self);
        Ok(ChangeFeed::new(id, table, rx, move || {
            if let Some(registry) = registry.upgrade() {
                registry.unregister(id);
            }
        }))
    }

    /// Remove a watcher. Returns false if it was not registered.
    pub fn unregister(&self, watch_id: u64) -> bool {
        let entry = self.watchers.write().remove(&watch_id);

        let entry = match entry {
            Some(e) => e,
            None => return false,
        };

        {
            let mut index = self.table_index.write();
            if let Some(ids) = index.get_mut(&entry.table) {
                ids.retain(|&id| id != watch_id);
                if ids.is_empty() {
                    index.remove(&entry.table);
                }
            }
        }

        tracing::debug!(
            watch_id,
            table = %entry.table,
            events_sent = entry.events_sent(),
            failures = entry.failures(),
            "watcher removed"
        );

        true
    }

    /// Evaluate an event against every watcher on its table and forward it.
    ///
    /// Returns the number of watchers that received the change.
    pub fn dispatch(&self, event: &ChangeEvent) -> usize {
        let watch_ids = {
            let index = self.table_index.read();
            match index.get(&event.table) {
                Some(ids) => ids.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut gone = Vec::new();
        {
            let watchers = self.watchers.read();
            for id in watch_ids {
                let Some(watcher) = watchers.get(&id) else {
                    continue;
                };

                let item = match &watcher.predicate {
                    None => Some(FeedItem::Change(event.clone())),
                    Some(predicate) => match predicate.evaluate(&event.new_value.topic) {
                        Ok(true) => Some(FeedItem::Change(event.clone())),
                        Ok(false) => None,
                        Err(e) => {
                            tracing::warn!(
                                watch_id = id,
                                table = %event.table,
                                seq = event.seq,
                                error = %e,
                                "predicate evaluation failed"
                            );
                            Some(FeedItem::PredicateFailed(PredicateFailure {
                                seq: event.seq,
                                table: event.table.clone(),
                                reason: e.to_string(),
                            }))
                        }
                    },
                };

                let Some(item) = item else {
                    continue;
                };
                let is_change = matches!(item, FeedItem::Change(_));
                if watcher.send(item) {
                    if is_change {
                        delivered += 1;
                    }
                } else {
                    gone.push(id);
                }
            }
        }

        for id in gone {
            self.unregister(id);
        }

        tracing::trace!(
            table = %event.table,
            seq = event.seq,
            delivered,
            "dispatched change event"
        );

        delivered
    }

    /// Terminate every feed and refuse new registrations.
    pub fn close_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let dropped = {
            let mut watchers = self.watchers.write();
            let count = watchers.len();
            watchers.clear();
            count
        };
        self.table_index.write().clear();

        tracing::debug!(watchers = dropped, "all change feeds terminated");
    }

    /// Whether the registry has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Get the number of active watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers.read().len()
    }

    /// Get the watchers registered on a table.
    pub fn watchers_for_table(&self, table: &str) -> Vec<u64> {
        self.table_index.read().get(table).cloned().unwrap_or_default()
    }
}

impl Default for FeedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared registry handle.
pub type SharedFeedRegistry = Arc<FeedRegistry>;
