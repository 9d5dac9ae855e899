//! Change-feed infrastructure.
//!
//! Watchers register interest in one table with an optional predicate. Every
//! write to that table is evaluated against each watcher's predicate on the
//! store side and forwarded only to the watchers it matches.

mod feed;
mod registry;
mod watcher;

pub use feed::ChangeFeed;
pub use registry::{FeedRegistry, SharedFeedRegistry};
pub use watcher::WatcherEntry;
