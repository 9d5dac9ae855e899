//! Forced-change token generation.
//!
//! Every publish stamps its document with a fresh token so the store always
//! sees a real change, even when topic and payload repeat exactly.

use std::sync::atomic::{AtomicU64, Ordering};

use repubsub_proto::ChangeToken;

/// Number of random bytes in a generated token.
pub const RANDOM_TOKEN_BYTES: usize = 16;

/// Source of per-publish change tokens.
pub trait ChangeTokenSource: Send + Sync {
    /// Produce a token distinct from any previously produced one.
    fn next_token(&self) -> ChangeToken;
}

/// Random 128-bit tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl ChangeTokenSource for RandomTokens {
    fn next_token(&self) -> ChangeToken {
        ChangeToken::from_bytes(&rand::random::<[u8; RANDOM_TOKEN_BYTES]>())
    }
}

/// Deterministic, strictly increasing tokens.
#[derive(Debug)]
pub struct SequentialTokens {
    prefix: String,
    next: AtomicU64,
}

impl SequentialTokens {
    /// Create a source producing `"{prefix}-1"`, `"{prefix}-2"`, ...
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    /// Number of tokens issued so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::SeqCst) - 1
    }
}

impl Default for SequentialTokens {
    fn default() -> Self {
        Self::new("token")
    }
}

impl ChangeTokenSource for SequentialTokens {
    fn next_token(&self) -> ChangeToken {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        ChangeToken(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_tokens_differ() {
        let tokens = RandomTokens;
        let a = tokens.next_token();
        let b = tokens.next_token();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), RANDOM_TOKEN_BYTES * 2);
    }

    #[test]
    fn test_sequential_tokens() {
        let tokens = SequentialTokens::new("t");
        assert_eq!(tokens.next_token(), ChangeToken("t-1".into()));
        assert_eq!(tokens.next_token(), ChangeToken("t-2".into()));
        assert_eq!(tokens.issued(), 2);
    }
}
