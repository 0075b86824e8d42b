//! Background Token Sweeper
//!
//! Expired and invalidated tokens are inert but still occupy their shard. This
//! module runs a background task that physically removes them.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and, on every tick:
//! 1. Locks exactly one token shard, the one under its cursor
//! 2. Removes every token whose expiry is strictly in the past
//! 3. Releases the lock and advances the cursor (wrapping)
//!
//! Sweeping one shard per tick bounds the pause any writer can observe to the
//! size of a single shard. A full pass over the store takes
//! `shard_count * interval`.
//!
//! The invalid marker is ignored here: an invalidated token is collected once its
//! original expiry has passed.

use crate::error::Result;
use crate::storage::TokenStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

/// A handle to the running sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    task: JoinHandle<()>,
}

impl ExpirySweeper {
    /// Starts the sweeper on the current Tokio runtime.
    ///
    /// Fails with [`Error::NoRuntime`](crate::Error::NoRuntime) when called
    /// outside a runtime.
    pub fn start(tokens: Arc<TokenStore>, interval: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = runtime.spawn(sweeper_loop(tokens, interval, shutdown_rx));

        info!(
            interval_ms = interval.as_millis() as u64,
            "Background token sweeper started"
        );

        Ok(Self { shutdown_tx, task })
    }

    /// Stops the sweeper. Calling this more than once is harmless.
    ///
    /// A sweep already in progress finishes and releases its shard first. No
    /// new sweep starts once the task has seen the signal, even if a tick is due.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("Background token sweeper stopped");
        }
    }

    /// Returns true once the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    tokens: Arc<TokenStore>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    let mut cursor = 0usize;

    loop {
        tokio::select! {
            biased;

            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Token sweeper received shutdown signal");
                    return;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        if *shutdown_rx.borrow() {
            debug!("Token sweeper received shutdown signal");
            return;
        }

        let removed = tokens.sweep_shard(cursor, SystemTime::now());

        if removed > 0 {
            debug!(
                shard = cursor,
                removed = removed,
                tokens_remaining = tokens.len(),
                "Expired tokens swept"
            );
        } else {
            trace!(shard = cursor, "Nothing to sweep");
        }

        cursor = (cursor + 1) % tokens.shard_count();
    }
}
