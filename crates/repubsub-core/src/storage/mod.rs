//! Storage layer.
//!
//! This module provides a sled-based message store: one tree per table, one
//! document per topic key.

mod config;
mod engine;

pub mod key;

pub use config::StorageConfig;
pub use engine::StorageEngine;
pub use key::TopicKey;
