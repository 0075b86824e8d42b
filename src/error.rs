//! Construction-time errors.
//!
//! Engine operations report business outcomes through [`Status`](crate::Status);
//! this type only covers failures to build an engine in the first place.

use thiserror::Error;

/// Errors that can occur while configuring or starting an engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A partitioned store was configured with zero shards
    #[error("invalid shard count for {store} store: must be at least 1")]
    InvalidShardCount { store: &'static str },

    /// A duration setting was zero
    #[error("invalid {field}: must be greater than zero")]
    InvalidDuration { field: &'static str },

    /// The engine was built outside a Tokio runtime, so the sweeper cannot start
    #[error("no Tokio runtime available to run the expiry sweeper: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Result type for engine construction.
pub type Result<T> = std::result::Result<T, Error>;
