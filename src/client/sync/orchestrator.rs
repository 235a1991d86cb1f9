//! # Sync Orchestrator
//!
//! Runs one sync cycle: snapshot the ledger, build the create and update
//! batches, make a single network exchange, hand each outcome to its
//! reconciler and apply the resulting write-sets.
//!
//! ## Cycle
//!
//! 1. Paused: schedule a deferred retry and return
//! 2. Another cycle running: return
//! 3. Nothing dirty: return without touching the network
//! 4. Experiences with a recorded sync error sit out until it is cleared
//! 5. Offline experiences go into the create batch, online ones into the
//!    update batch; what was sent is kept for reconciliation
//! 6. Paused while building: reschedule and abort
//! 7. One call: combined, create-only or update-only
//! 8. Outcomes are reconciled against a fresh read of the store
//! 9. Write-sets applied, flag released, store persisted, event broadcast
//!
//! Steps 3 to 5 and steps 8 to 9 each run under the store's commit lock.
//! Local edits may land while the request is in flight, never while a
//! batch is being built or merged back.
//!
//! Transport failures are logged and swallowed. The flag is released on
//! every path by the [`SyncGuard`](super::sync_state::SyncGuard).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, error, info, warn};

use super::inputs::{build_create_input, build_update_input};
use super::metrics::SyncMetrics;
use super::sync_state::{AcquireError, SyncFlag};
use crate::client::local_db::LocalStore;
use crate::client::offline::ids::is_offline_id;
use crate::client::offline::reconciliation::{
    reconcile_creates, reconcile_update, CreateContext, SentCreate, SentUpdate, UpdateContext,
    WriteSet,
};
use crate::client::remote::inputs::{CreateExperienceInput, UpdateExperienceInput};
use crate::client::remote::outcomes::{
    CreateExperienceOutcome, UpdateExperienceOutcome, UpdateExperiencesOutcome,
};
use crate::client::remote::RemoteApi;
use crate::shared::event::SyncCompletedEvent;
use crate::shared::journal::{EntryConnection, Experience};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Which path a cycle took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Sync is paused; a retry was scheduled
    Paused,
    /// Another cycle was running
    Busy,
    /// The ledger was empty
    NothingToSync,
    /// Sync was paused while the batches were being built
    Aborted,
    /// Every dirty experience was skipped
    NothingSent,
    /// The network exchange failed
    TransportFailed,
    Completed { created: usize, updated: usize },
}

pub struct SyncOrchestrator {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteApi>,
    flag: Arc<SyncFlag>,
    events: broadcast::Sender<SyncCompletedEvent>,
    retry: Arc<Notify>,
    retry_pending: Arc<AtomicBool>,
    retry_wait: Duration,
    metrics: Mutex<SyncMetrics>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        flag: Arc<SyncFlag>,
        retry_wait: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            remote,
            flag,
            events,
            retry: Arc::new(Notify::new()),
            retry_pending: Arc::new(AtomicBool::new(false)),
            retry_wait,
            metrics: Mutex::new(SyncMetrics::new()),
        }
    }

    pub fn flag(&self) -> &Arc<SyncFlag> {
        &self.flag
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// Notified when a paused cycle's retry wait has elapsed
    pub fn retry_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.retry)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncCompletedEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> SyncMetrics {
        self.metrics.lock().clone()
    }

    /// Run one sync cycle
    pub async fn sync_to_server(&self) -> CycleOutcome {
        let guard = match self.flag.try_acquire() {
            Ok(guard) => guard,
            Err(AcquireError::Paused) => {
                debug!("sync paused, retrying in {:?}", self.retry_wait);
                self.metrics.lock().record_skipped_paused();
                self.schedule_retry();
                return CycleOutcome::Paused;
            }
            Err(AcquireError::Busy) => {
                debug!("sync already running");
                self.metrics.lock().record_skipped_busy();
                return CycleOutcome::Busy;
            }
        };

        let commit = self.store.commit_lock().lock().await;
        let ledger = self.store.ledger().read_all().await;
        if ledger.is_empty() {
            return CycleOutcome::NothingToSync;
        }

        self.metrics.lock().record_sync_start();
        info!(dirty = ledger.len(), "sync cycle started");

        let mut creates: Vec<CreateExperienceInput> = Vec::new();
        let mut updates: Vec<UpdateExperienceInput> = Vec::new();
        let mut sent_updates: BTreeMap<String, SentUpdate> = BTreeMap::new();

        for (experience_id, record) in &ledger {
            if self.store.sync_errors().has_error(experience_id).await {
                debug!(%experience_id, "skipping experience with a sync error");
                continue;
            }

            let Some(experience) = self.store.read_experience(experience_id).await else {
                warn!(%experience_id, "dirty experience missing from store");
                continue;
            };
            let connection = self.store.read_entries(experience_id).await;

            if is_offline_id(experience_id) {
                creates.push(build_create_input(&experience, connection.as_ref()));
            } else {
                let leftovers = self.read_leftovers(&experience).await;
                match build_update_input(&experience, connection.as_ref(), leftovers.as_ref(), record) {
                    Some(input) => {
                        sent_updates.insert(
                            experience_id.clone(),
                            SentUpdate::new(input.clone(), record.clone()),
                        );
                        updates.push(input);
                    }
                    None => debug!(%experience_id, "nothing to send for dirty experience"),
                }
            }
        }
        drop(commit);

        if !self.flag.can_sync() {
            info!("sync paused while preparing, aborting cycle");
            self.metrics.lock().record_sync_idle();
            drop(guard);
            self.schedule_retry();
            return CycleOutcome::Aborted;
        }

        let created = creates.len();
        let updated = updates.len();

        let sent_create = SentCreate::new(creates.clone());
        let response = match (creates.is_empty(), updates.is_empty()) {
            (true, true) => {
                self.metrics.lock().record_sync_idle();
                return CycleOutcome::NothingSent;
            }
            (false, false) => self
                .remote
                .sync(creates, updates)
                .await
                .map(|response| (response.create_experiences, response.update_experiences)),
            (false, true) => self
                .remote
                .create_experiences(creates)
                .await
                .map(|outcomes| (Some(outcomes), None)),
            (true, false) => self
                .remote
                .update_experiences(updates)
                .await
                .map(|outcome| (None, Some(outcome))),
        };

        let (create_outcomes, update_outcomes) = match response {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "sync request failed");
                self.metrics.lock().record_sync_failure();
                drop(guard);
                self.persist().await;
                return CycleOutcome::TransportFailed;
            }
        };

        // edits made while the request was in flight are in the re-read
        let commit = self.store.commit_lock().lock().await;
        let mut write_set = WriteSet::default();
        if let Some(outcomes) = create_outcomes {
            if let Some(creates) = self.reconcile_creates(&sent_create, &outcomes).await {
                write_set.merge(creates);
            }
        }
        if let Some(outcome) = update_outcomes {
            write_set.merge(self.reconcile_updates(&sent_updates, &outcome).await);
        }

        self.store.apply_write_set(&write_set).await;
        drop(commit);
        for (offline_id, experience) in &write_set.offline_id_to_online_experience {
            self.flag
                .record_online_id_for_offline_id(&experience.id, offline_id);
        }

        drop(guard);
        self.persist().await;
        if let Err(err) = self.store.record_sync_completed().await {
            warn!(error = %err, "failed to record sync time");
        }

        let sync_errors = write_set.recorded_errors();
        let event = SyncCompletedEvent::new(
            write_set.offline_id_to_online_experience,
            write_set.experience_id_to_offline_entries,
            sync_errors,
            write_set.online_status,
        );
        self.metrics.lock().record_sync_success();
        info!(created, updated, "sync cycle completed");

        // no subscribers is fine
        let _ = self.events.send(event);
        CycleOutcome::Completed { created, updated }
    }

    async fn reconcile_creates(
        &self,
        sent: &SentCreate,
        outcomes: &[CreateExperienceOutcome],
    ) -> Option<WriteSet> {
        let mut experiences: BTreeMap<String, Experience> = BTreeMap::new();
        let mut connections: BTreeMap<String, EntryConnection> = BTreeMap::new();

        for offline_id in sent.inputs.iter().map(|input| &input.client_id) {
            if let Some(experience) = self.store.read_experience(offline_id).await {
                experiences.insert(offline_id.clone(), experience);
            }
            if let Some(connection) = self.store.read_entries(offline_id).await {
                connections.insert(offline_id.clone(), connection);
            }
        }

        let context = CreateContext {
            experiences: &experiences,
            connections: &connections,
            sent,
        };
        reconcile_creates(context, outcomes)
    }

    async fn reconcile_updates(
        &self,
        sent: &BTreeMap<String, SentUpdate>,
        outcome: &UpdateExperiencesOutcome,
    ) -> WriteSet {
        let outcomes: &[UpdateExperienceOutcome] = match outcome {
            UpdateExperiencesOutcome::UpdateExperiencesSomeSuccess { experiences } => experiences,
            UpdateExperiencesOutcome::UpdateExperiencesAllFail { error } => {
                warn!(%error, "server rejected every experience update");
                return WriteSet::default();
            }
        };

        let mut write_set = WriteSet::default();
        for outcome in outcomes {
            let experience_id = outcome.experience_id();
            let Some(sent) = sent.get(experience_id) else {
                warn!(%experience_id, "update outcome for experience that was not sent");
                continue;
            };
            let Some(experience) = self.store.read_experience(experience_id).await else {
                warn!(%experience_id, "update outcome for experience missing from store");
                continue;
            };

            let connection = self.store.read_entries(experience_id).await;
            let leftovers = self.read_leftovers(&experience).await;
            let record = self.store.ledger().read(experience_id).await;
            let previous_error = self.store.sync_errors().get(experience_id).await;

            let context = UpdateContext {
                experience: &experience,
                connection: connection.as_ref(),
                leftovers: leftovers.as_ref(),
                ledger: record.as_ref(),
                previous_error: previous_error.as_ref(),
                sent,
            };
            write_set.merge(reconcile_update(context, outcome));
        }
        write_set
    }

    /// Entries still kept under the offline id an experience was created with
    async fn read_leftovers(&self, experience: &Experience) -> Option<EntryConnection> {
        let offline_id = experience
            .client_id
            .as_deref()
            .filter(|client_id| is_offline_id(client_id) && *client_id != experience.id)?;
        self.store.read_entries(offline_id).await
    }

    async fn persist(&self) {
        if let Err(err) = self.store.persist().await {
            error!(error = %err, "failed to persist local store");
        }
    }

    fn schedule_retry(&self) {
        if self.retry_pending.swap(true, Ordering::AcqRel) {
            return;
        }

        let retry = Arc::clone(&self.retry);
        let pending = Arc::clone(&self.retry_pending);
        let wait = self.retry_wait;
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            pending.store(false, Ordering::Release);
            retry.notify_one();
        });
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("flag", &self.flag.get())
            .field("retry_wait", &self.retry_wait)
            .finish_non_exhaustive()
    }
}
