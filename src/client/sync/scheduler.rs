//! # Sync Scheduler
//!
//! Decides when the background loop should run its next periodic cycle.
//! Explicit requests and paused retries bypass it.

use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct SyncScheduler {
    /// Last time a cycle ran
    last_sync: RwLock<Option<Instant>>,
    interval: Duration,
    is_active: RwLock<bool>,
}

impl SyncScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_sync: RwLock::new(None),
            interval,
            is_active: RwLock::new(false),
        }
    }

    pub async fn start(&self) {
        *self.is_active.write().await = true;
    }

    pub async fn stop(&self) {
        *self.is_active.write().await = false;
    }

    pub async fn is_active(&self) -> bool {
        *self.is_active.read().await
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a periodic cycle is due
    pub async fn should_sync(&self) -> bool {
        if !*self.is_active.read().await {
            return false;
        }

        match *self.last_sync.read().await {
            Some(time) => time.elapsed() >= self.interval,
            None => true, // First sync
        }
    }

    /// Record that a cycle ran, whatever its outcome
    pub async fn record_sync(&self) {
        *self.last_sync.write().await = Some(Instant::now());
    }

    /// Time until the next periodic cycle; zero when one is due
    pub async fn time_until_next_sync(&self) -> Duration {
        let Some(last_sync) = *self.last_sync.read().await else {
            return Duration::ZERO;
        };

        self.interval.saturating_sub(last_sync.elapsed())
    }
}
