//! Topic key derivation.

use std::fmt;

use repubsub_proto::TopicValue;

use crate::error::StoreError;

/// Size of a topic key in bytes.
pub const TOPIC_KEY_SIZE: usize = 32;

/// Storage key for a topic's document.
///
/// Key format: BLAKE3 digest of the topic's canonical JSON encoding. Equal
/// topic values always produce the same key regardless of object key order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopicKey([u8; TOPIC_KEY_SIZE]);

impl TopicKey {
    /// Derive the key for a topic value.
    pub fn derive(topic: &TopicValue) -> Result<Self, StoreError> {
        let canonical = topic.canonical_bytes()?;
        Ok(Self(*blake3::hash(&canonical).as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; TOPIC_KEY_SIZE] {
        &self.0
    }

    /// Pick the lock stripe guarding writes to this key.
    pub fn stripe(&self, stripes: usize) -> usize {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.0[..8]);
        (u64::from_be_bytes(prefix) % stripes.max(1) as u64) as usize
    }
}

impl fmt::Debug for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicKey(")?;
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..)")
    }
}
