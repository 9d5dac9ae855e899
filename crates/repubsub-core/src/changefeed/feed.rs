//! The receiving end of a change feed.

use std::fmt;
use std::task::{Context, Poll};

use tokio::sync::mpsc;

use repubsub_proto::FeedItem;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// A live, filtered stream of changes on one table.
///
/// The watcher backing the feed is released when the feed is closed or
/// dropped, whichever comes first. `recv` returning `None` means the store
/// ended the feed (shutdown or connection loss); it never happens because the
/// table ran out of changes.
pub struct ChangeFeed {
    id: u64,
    table: String,
    rx: mpsc::UnboundedReceiver<FeedItem>,
    release: Option<ReleaseFn>,
}

impl ChangeFeed {
    /// Create a feed over `rx`; `release` runs exactly once on close or drop.
    pub fn new(
        id: u64,
        table: impl Into<String>,
        rx: mpsc::UnboundedReceiver<FeedItem>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            table: table.into(),
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// Watcher ID assigned by the store.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Table being watched.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Receive the next item, waiting until one arrives.
    pub async fn recv(&mut self) -> Option<FeedItem> {
        self.rx.recv().await
    }

    /// Poll for the next item.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<FeedItem>> {
        self.rx.poll_recv(cx)
    }

    /// Release the watcher. Further receives drain what was already queued.
    pub fn close(&mut self) {
        if let Some(release) = self.release.take() {
            self.rx.close();
            release();
        }
    }

    /// Whether `close` has run.
    pub fn is_closed(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("id", &self.id)
            .field("table", &self.table)
            .field("closed", &self.is_closed())
            .finish()
    }
}
