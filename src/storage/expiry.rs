//! Background Expiry Sweeper
//!
//! This module runs the single task that fires expiry timers. Every `EXPIRE`
//! queues a timer inside the storage engine; the sweeper sleeps until the
//! earliest one is due, then removes the keys whose timers are still current.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Sleeps until the earliest queued deadline (or the idle interval)
//! 2. Wakes early when a new timer is queued, since it may be due sooner
//! 3. Fires due timers in bounded batches so the write lock is held briefly
//! 4. Logs how many keys were reclaimed
//!
//! Reads already hide keys whose deadline has passed, so the sweeper only
//! decides when the memory is given back, never whether a key is visible.

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Longest sleep when no timer is due sooner (default: 1s)
    pub idle_interval: Duration,

    /// Maximum timers fired per lock acquisition (default: 256)
    pub batch_limit: usize,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(1),
            batch_limit: 256,
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime. The sweeper stops when the
    /// returned handle is dropped.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use linekv::storage::{StorageEngine, ExpirySweeper, ExpiryConfig};
    /// use std::sync::Arc;
    ///
    /// let engine = Arc::new(StorageEngine::new());
    /// let sweeper = ExpirySweeper::start(engine, ExpiryConfig::default());
    ///
    /// // Dropping the sweeper will stop it
    /// drop(sweeper);
    /// ```
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("Background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let idle_until = Instant::now() + config.idle_interval;
        let wake_at = engine
            .next_deadline()
            .map_or(idle_until, |deadline| deadline.min(idle_until));

        tokio::select! {
            biased;

            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
            _ = engine.timer_added() => {
                trace!("Timer queued, recomputing next deadline");
                continue;
            }
            _ = tokio::time::sleep_until(wake_at.into()) => {}
        }

        let mut expired = 0u64;
        loop {
            expired += engine.fire_due_timers(Instant::now(), config.batch_limit);

            let more_due = engine
                .next_deadline()
                .is_some_and(|deadline| deadline <= Instant::now());
            if !more_due {
                break;
            }
            // Let connection tasks at the lock between batches
            tokio::task::yield_now().await;
        }

        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = engine.len(),
                "Expired keys cleaned up"
            );
        }
    }
}

/// Starts the expiry sweeper with default configuration.
///
/// This is a convenience function for simple use cases.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}
