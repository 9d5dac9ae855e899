//! repubsub core - an embedded message store with filtered change feeds.
//!
//! This crate provides the store side of the exchange: the [`MessageStore`]
//! boundary trait and a sled-backed implementation, [`StorageEngine`], which
//! keeps one document per topic and evaluates subscriber predicates before
//! any change leaves the store.

pub mod changefeed;
pub mod error;
pub mod predicate;
pub mod storage;
pub mod store;

pub use changefeed::{ChangeFeed, FeedRegistry, SharedFeedRegistry, WatcherEntry};
pub use error::StoreError;
pub use predicate::{CompiledPredicate, PredicateError};
pub use storage::{StorageConfig, StorageEngine, TopicKey};
pub use store::{MessageStore, UpsertOutcome, UpsertRequest};

/// Re-export protocol types.
pub use repubsub_proto as proto;
