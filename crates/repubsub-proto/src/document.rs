//! The message document persisted by the store.
//!
//! One document exists per distinct topic value per table. It is overwritten
//! on every publish to that topic and never forms a history.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::topic::TopicValue;

/// Arbitrary structured message content. Opaque to the exchange.
pub type Payload = serde_json::Value;

/// Size of a document identifier in bytes.
pub const DOCUMENT_ID_SIZE: usize = 16;

/// Store-assigned document identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub [u8; DOCUMENT_ID_SIZE]);

impl DocumentId {
    /// Get the raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; DOCUMENT_ID_SIZE] {
        &self.0
    }

    /// Parse an identifier from its hex form.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(|e| Error::Deserialization(e.to_string()))?;
        let id: [u8; DOCUMENT_ID_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
            Error::Deserialization(format!(
                "document id must be {DOCUMENT_ID_SIZE} bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(id))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", hex::encode(self.0))
    }
}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DocumentId::from_hex(&s).map_err(de::Error::custom)
    }
}

/// Per-publish value that makes every write observably different.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeToken(pub String);

impl ChangeToken {
    /// Create a token from raw bytes, hex encoded.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored message document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDocument {
    /// Stable for the lifetime of the topic's current document.
    pub id: DocumentId,
    /// Upsert key and predicate subject.
    pub topic: TopicValue,
    /// Publisher content.
    pub payload: Payload,
    /// Regenerated on every publish.
    pub force_change_token: ChangeToken,
}

impl MessageDocument {
    /// Serialize the document to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a document from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Project out the `(topic, payload)` pair, discarding store bookkeeping.
    pub fn into_message(self) -> Message {
        Message {
            topic: self.topic,
            payload: self.payload,
        }
    }
}

/// A message as seen by a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub topic: TopicValue,
    pub payload: Payload,
}

impl Message {
    pub fn new(topic: impl Into<TopicValue>, payload: Payload) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Split into the `(topic, payload)` pair.
    pub fn into_parts(self) -> (TopicValue, Payload) {
        (self.topic, self.payload)
    }
}
