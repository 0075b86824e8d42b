//! Engine configuration.

use crate::error::{Error, Result};
use std::time::Duration;

/// Default number of user shards.
pub const DEFAULT_USER_SHARDS: usize = 1024;

/// Default number of token shards.
pub const DEFAULT_TOKEN_SHARDS: usize = 1024;

/// Default token time-to-live (2 hours).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Default period between two sweeper ticks.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(200);

/// Configuration for an [`AuthEngine`](crate::AuthEngine).
///
/// Shard counts are fixed for the lifetime of the engine: the same count is used
/// to place a record and to find it again.
///
/// # Example
///
/// ```
/// use flashauth::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::default()
///     .with_token_shards(16)
///     .with_token_ttl(Duration::from_secs(600));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of independently locked user shards
    pub user_shards: usize,

    /// Number of independently locked token shards
    pub token_shards: usize,

    /// Lifetime granted to a token at issue or renewal
    pub token_ttl: Duration,

    /// Period between sweeper ticks; each tick scans one token shard
    pub sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_shards: DEFAULT_USER_SHARDS,
            token_shards: DEFAULT_TOKEN_SHARDS,
            token_ttl: DEFAULT_TOKEN_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl EngineConfig {
    pub fn with_user_shards(mut self, shards: usize) -> Self {
        self.user_shards = shards;
        self
    }

    pub fn with_token_shards(mut self, shards: usize) -> Self {
        self.token_shards = shards;
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Checks that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        if self.user_shards == 0 {
            return Err(Error::InvalidShardCount { store: "user" });
        }
        if self.token_shards == 0 {
            return Err(Error::InvalidShardCount { store: "token" });
        }
        if self.token_ttl.is_zero() {
            return Err(Error::InvalidDuration { field: "token_ttl" });
        }
        if self.sweep_interval.is_zero() {
            return Err(Error::InvalidDuration {
                field: "sweep_interval",
            });
        }
        Ok(())
    }
}
