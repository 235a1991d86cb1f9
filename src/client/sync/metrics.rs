//! # Sync Metrics
//!
//! Counters for sync cycles, updated by the orchestrator.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct SyncMetrics {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    pub skipped_busy: u64,
    pub skipped_paused: u64,
    pub average_sync_duration: Duration,
    pub last_sync_duration: Option<Duration>,
    pub last_sync_start: Option<Instant>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sync_start(&mut self) {
        self.last_sync_start = Some(Instant::now());
        self.total_syncs += 1;
    }

    pub fn record_sync_success(&mut self) {
        if let Some(start) = self.last_sync_start.take() {
            let duration = start.elapsed();
            self.last_sync_duration = Some(duration);
            self.successful_syncs += 1;

            // Update rolling average
            let total_duration =
                self.average_sync_duration * (self.successful_syncs - 1) as u32 + duration;
            self.average_sync_duration = total_duration / self.successful_syncs as u32;
        }
    }

    pub fn record_sync_failure(&mut self) {
        self.last_sync_start = None;
        self.failed_syncs += 1;
    }

    /// A cycle started but had nothing to send
    pub fn record_sync_idle(&mut self) {
        self.last_sync_start = None;
    }

    pub fn record_skipped_busy(&mut self) {
        self.skipped_busy += 1;
    }

    pub fn record_skipped_paused(&mut self) {
        self.skipped_paused += 1;
    }

    pub fn success_rate(&self) -> f64 {
        let attempted = self.successful_syncs + self.failed_syncs;
        if attempted == 0 {
            0.0
        } else {
            self.successful_syncs as f64 / attempted as f64
        }
    }
}
