//! repubsub - topic-based publish/subscribe over a changefeed document store.
//!
//! An [`Exchange`] owns one table. Publishers write through [`Topic`]
//! handles; each publish upserts the single document for its topic with a
//! fresh change token, so every publish produces exactly one change
//! notification. Subscribers describe the topics they want with a
//! [`TopicPredicate`] on a [`Queue`]; the predicate is evaluated by the store
//! and matching changes arrive on a [`Subscription`].
//!
//! Delivery is at most once. The table holds only the latest message per
//! topic; a subscriber that is not connected when a publish happens will
//! never see it.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use repubsub::{Exchange, ExchangeConfig, TopicPredicate};
//! use repubsub_core::{StorageConfig, StorageEngine};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(StorageEngine::open(StorageConfig::temporary())?);
//!     let exchange = Exchange::open(store, ExchangeConfig::new("weather")).await?;
//!
//!     let mut sub = exchange.queue(TopicPredicate::matches(".*ca.*")).subscribe().await?;
//!
//!     exchange
//!         .topic("weather.ca.mountainview")
//!         .publish(json!({"temp": 70}))
//!         .await?;
//!
//!     let (topic, payload) = sub.recv().await?.into_parts();
//!     println!("{topic}: {payload}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod exchange;
pub mod queue;
pub mod subscription;
pub mod token;
pub mod topic;

pub use config::ExchangeConfig;
pub use error::Error;
pub use exchange::Exchange;
pub use queue::Queue;
pub use subscription::{PredicateWarning, QueueEvent, Subscription, SubscriptionStats};
pub use token::{ChangeTokenSource, RandomTokens, SequentialTokens};
pub use topic::Topic;

pub use repubsub_proto::{Message, PathTest, Payload, TopicPredicate, TopicValue};

/// Re-export protocol types.
pub use repubsub_proto as proto;
