//! Store error types.

use thiserror::Error;

/// Message store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] repubsub_proto::Error),

    /// The store has been shut down or cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused a write.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The table has not been created.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The table name is not acceptable.
    #[error("invalid table name: {0:?}")]
    InvalidTable(String),
}
