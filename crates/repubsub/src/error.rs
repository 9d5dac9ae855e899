//! Exchange error types.

use repubsub_core::StoreError;
use thiserror::Error;

/// Exchange errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The store could not be reached for a publish or subscribe.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store refused a publish; nothing was written.
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// An open subscription lost its change feed.
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    /// The subscription was closed by its owner.
    #[error("subscription closed")]
    SubscriptionClosed,
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Error::StoreUnavailable(msg),
            StoreError::Storage(e) => Error::StoreUnavailable(e.to_string()),
            StoreError::UnknownTable(table) => {
                Error::StoreUnavailable(format!("table {table} does not exist"))
            }
            StoreError::Rejected(msg) => Error::WriteRejected(msg),
            StoreError::InvalidTable(table) => {
                Error::WriteRejected(format!("invalid table name {table:?}"))
            }
            StoreError::Protocol(e) => Error::WriteRejected(e.to_string()),
        }
    }
}
