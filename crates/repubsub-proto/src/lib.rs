//! repubsub protocol types.
//!
//! This crate defines the shapes shared by the exchange and the message
//! store: topic values, the persisted message document, topic predicates and
//! change-feed items. Everything serializes with serde; documents are stored
//! as JSON.
//!
//! # Modules
//!
//! - [`topic`] - Topic values (string, tag sequence, nested object)
//! - [`document`] - The persisted message document and its projection
//! - [`predicate`] - Server-evaluable topic predicates
//! - [`change`] - Change-feed events
//! - [`error`] - Protocol error types

pub mod change;
pub mod document;
pub mod error;
pub mod predicate;
pub mod topic;

pub use change::{ChangeEvent, FeedItem, PredicateFailure};
pub use document::{ChangeToken, DocumentId, Message, MessageDocument, Payload, DOCUMENT_ID_SIZE};
pub use error::Error;
pub use predicate::{PathTest, TopicPredicate};
pub use topic::{TopicShape, TopicValue};
