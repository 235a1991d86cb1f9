//! # Background Sync Service
//!
//! Runs sync cycles in the background: periodically, on request, and when a
//! paused cycle's retry wait elapses.
//!
//! ## Architecture
//!
//! - **Sync Flag**: `sync_state.rs`, the only mutual exclusion for cycles
//! - **Orchestrator**: `orchestrator.rs`, one cycle end to end
//! - **Request builders**: `inputs.rs`, ledger records to request payloads
//! - **Scheduler**: `scheduler.rs`, periodic timing
//! - **Metrics**: `metrics.rs`, cycle counters
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use journal_sync::client::local_db::LocalCache;
//! use journal_sync::client::remote::HttpRemoteApi;
//! use journal_sync::client::sync::SyncService;
//! use journal_sync::shared::SyncConfig;
//!
//! # async fn example() -> Result<(), journal_sync::shared::EngineError> {
//! let config = SyncConfig::default();
//! let remote = Arc::new(HttpRemoteApi::new(&config)?);
//! let mut service = SyncService::new(Arc::new(LocalCache::new()), remote, &config);
//!
//! let mut events = service.subscribe();
//! service.start();
//! service.request_sync();
//!
//! if let Ok(event) = events.recv().await {
//!     println!("synced: {:?}", event.online_status);
//! }
//! service.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod inputs;
pub mod metrics;
pub mod orchestrator;
pub mod scheduler;
pub mod sync_state;

pub use metrics::SyncMetrics;
pub use orchestrator::{CycleOutcome, SyncOrchestrator};
pub use scheduler::SyncScheduler;
pub use sync_state::{AcquireError, SyncFlag, SyncGuard, SyncState};

use std::sync::Arc;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;

use crate::client::local_db::LocalStore;
use crate::client::remote::RemoteApi;
use crate::shared::config::SyncConfig;
use crate::shared::event::SyncCompletedEvent;

/// Owns the orchestrator and the background task driving it
#[derive(Debug)]
pub struct SyncService {
    orchestrator: Arc<SyncOrchestrator>,
    scheduler: Arc<SyncScheduler>,
    /// Wakes the background task; shared with the orchestrator's retries
    trigger: Arc<Notify>,
    /// Tells the background task to exit once its current cycle is done
    shutdown: Option<watch::Sender<bool>>,
    background_task: Option<JoinHandle<()>>,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        config: &SyncConfig,
    ) -> Self {
        let orchestrator = SyncOrchestrator::new(
            store,
            remote,
            Arc::new(SyncFlag::new()),
            config.retry_wait(),
        );
        let trigger = orchestrator.retry_signal();

        Self {
            orchestrator: Arc::new(orchestrator),
            scheduler: Arc::new(SyncScheduler::new(config.sync_interval())),
            trigger,
            shutdown: None,
            background_task: None,
        }
    }

    /// Spawn the background task. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let scheduler = Arc::clone(&self.scheduler);
        let trigger = Arc::clone(&self.trigger);
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        tracing::info!(interval = ?scheduler.interval(), "starting background sync");
        self.shutdown = Some(shutdown);
        self.background_task = Some(tokio::spawn(async move {
            scheduler.start().await;
            loop {
                let wait = scheduler.time_until_next_sync().await;
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = trigger.notified() => {}
                    // a dropped sender also ends the loop
                    _ = shutdown_rx.changed() => break,
                }
                if *shutdown_rx.borrow() {
                    break;
                }

                // runs to completion; shutdown is only checked between cycles
                let outcome = orchestrator.sync_to_server().await;
                tracing::debug!(?outcome, "background cycle finished");
                scheduler.record_sync().await;
            }
            tracing::debug!("background sync loop exited");
        }));
    }

    /// Stop the background task. A cycle in flight finishes, including its
    /// write-back, before this returns.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.background_task.take() {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "background sync task failed");
            }
            tracing::info!("background sync stopped");
        }
        self.scheduler.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.background_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Ask the background task for a cycle now
    pub fn request_sync(&self) {
        self.trigger.notify_one();
    }

    /// Run a cycle on the caller's task
    pub async fn sync_now(&self) -> CycleOutcome {
        self.orchestrator.sync_to_server().await
    }

    pub fn pause(&self) {
        self.orchestrator.flag().pause();
    }

    pub fn resume(&self) {
        self.orchestrator.flag().resume();
    }

    pub fn flag(&self) -> &Arc<SyncFlag> {
        self.orchestrator.flag()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncCompletedEvent> {
        self.orchestrator.subscribe()
    }

    pub fn metrics(&self) -> SyncMetrics {
        self.orchestrator.metrics()
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        self.orchestrator.store()
    }
}

impl Drop for SyncService {
    /// Signals the background task and detaches it; a cycle in flight still
    /// writes its outcome back
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
    }
}
