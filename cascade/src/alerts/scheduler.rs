//! Interval-driven alert evaluation.

use super::engine::AlertEngine;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Background task that sweeps every enabled alert on a fixed interval.
///
/// Each alert's cron expression stays declarative metadata; the operational
/// cadence is this scheduler's interval, with cooldown windows keeping
/// delivery frequency in check.
pub struct AlertScheduler {
    engine: Arc<AlertEngine>,
    interval: Duration,
    running: AtomicBool,
    handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl AlertScheduler {
    /// Creates a scheduler for the engine.
    #[must_use]
    pub fn new(engine: Arc<AlertEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            running: AtomicBool::new(false),
            handle: RwLock::new(None),
        }
    }

    /// Starts the sweep loop.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return; // Already running
        }

        let engine = self.engine.clone();
        let interval = self.interval;
        info!(interval_secs = interval.as_secs(), "Alert scheduler starting");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so the first sweep
            // lands one interval after start.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let evaluations = engine.evaluate_all().await;
                debug!(evaluations = evaluations.len(), "Alert sweep finished");
            }
        });

        *self.handle.write() = Some(handle);
    }

    /// Returns whether the sweep loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stops the sweep loop.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return; // Not running
        }

        if let Some(handle) = self.handle.write().take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl std::fmt::Debug for AlertScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertScheduler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}
