//! In-Memory Local Cache
//!
//! `LocalStore` backed by in-memory maps. When attached to a
//! [`LocalDatabase`] the whole state (experiences, connections, ledger and
//! sync errors) is written as JSON values under fixed keys on `persist` and
//! read back by [`LocalCache::restore`].

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::{Mutex, RwLock};

use super::store::LocalStore;
use super::{LocalDatabase, Result};
use crate::client::offline::ledger::{UnsyncedLedger, UnsyncedModifiedExperience};
use crate::client::offline::reconciliation::{LedgerWrite, WriteSet};
use crate::client::offline::sync_errors::{SyncError, SyncErrorStore};
use crate::shared::journal::{EntryConnection, Experience};

const EXPERIENCES_KEY: &str = "experiences";
const ENTRIES_KEY: &str = "entries";
const LEDGER_KEY: &str = "unsynced_ledger";
const SYNC_ERRORS_KEY: &str = "sync_errors";

#[derive(Debug, Default)]
pub struct LocalCache {
    experiences: RwLock<Vec<Experience>>,
    connections: RwLock<BTreeMap<String, EntryConnection>>,
    ledger: UnsyncedLedger,
    sync_errors: SyncErrorStore,
    commit: Mutex<()>,
    database: Option<LocalDatabase>,
}

impl LocalCache {
    /// Empty cache with no durable storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache persisting into `database`
    pub fn with_database(database: LocalDatabase) -> Self {
        Self {
            database: Some(database),
            ..Default::default()
        }
    }

    /// Cache loaded from whatever `database` holds
    pub async fn restore(database: LocalDatabase) -> Result<Self> {
        let experiences: Vec<Experience> =
            database.get_value(EXPERIENCES_KEY).await?.unwrap_or_default();
        let connections: BTreeMap<String, EntryConnection> =
            database.get_value(ENTRIES_KEY).await?.unwrap_or_default();
        let ledger: BTreeMap<String, UnsyncedModifiedExperience> =
            database.get_value(LEDGER_KEY).await?.unwrap_or_default();
        let sync_errors: BTreeMap<String, SyncError> =
            database.get_value(SYNC_ERRORS_KEY).await?.unwrap_or_default();

        tracing::info!(
            experiences = experiences.len(),
            connections = connections.len(),
            "restored local cache"
        );

        let cache = Self {
            experiences: RwLock::new(experiences),
            connections: RwLock::new(connections),
            ledger: UnsyncedLedger::new(),
            sync_errors: SyncErrorStore::new(),
            commit: Mutex::new(()),
            database: Some(database),
        };
        cache.ledger.restore(ledger).await;
        cache.sync_errors.restore(sync_errors).await;
        Ok(cache)
    }

    pub fn database(&self) -> Option<&LocalDatabase> {
        self.database.as_ref()
    }
}

/// Replace the experience with id `key` in place, or prepend
fn replace_or_prepend(experiences: &mut Vec<Experience>, key: &str, experience: Experience) {
    match experiences.iter_mut().find(|e| e.id == key) {
        Some(slot) => *slot = experience,
        None => experiences.insert(0, experience),
    }
}

#[async_trait]
impl LocalStore for LocalCache {
    async fn read_experience(&self, experience_id: &str) -> Option<Experience> {
        self.experiences
            .read()
            .await
            .iter()
            .find(|experience| experience.id == experience_id)
            .cloned()
    }

    async fn write_experience(&self, experience: Experience) {
        let mut experiences = self.experiences.write().await;
        let key = experience.id.clone();
        replace_or_prepend(&mut experiences, &key, experience);
    }

    async fn read_entries(&self, experience_id: &str) -> Option<EntryConnection> {
        self.connections.read().await.get(experience_id).cloned()
    }

    async fn write_entries(&self, experience_id: &str, connection: EntryConnection) {
        self.connections
            .write()
            .await
            .insert(experience_id.to_string(), connection);
    }

    async fn upsert_experiences(&self, pairs: Vec<(String, Experience)>) {
        let mut experiences = self.experiences.write().await;
        for (key, experience) in pairs {
            replace_or_prepend(&mut experiences, &key, experience);
        }
    }

    async fn list_experiences(&self) -> Vec<Experience> {
        self.experiences.read().await.clone()
    }

    fn ledger(&self) -> &UnsyncedLedger {
        &self.ledger
    }

    fn sync_errors(&self) -> &SyncErrorStore {
        &self.sync_errors
    }

    fn commit_lock(&self) -> &Mutex<()> {
        &self.commit
    }

    async fn apply_write_set(&self, write_set: &WriteSet) {
        // lock order: experiences, connections, ledger, sync errors
        let mut experiences = self.experiences.write().await;
        let mut connections = self.connections.write().await;
        let mut ledger = self.ledger.writer().await;
        let mut sync_errors = self.sync_errors.writer().await;

        for experience in &write_set.experiences {
            replace_or_prepend(&mut experiences, &experience.id, experience.clone());
        }
        for (experience_id, connection) in &write_set.connections {
            connections.insert(experience_id.clone(), connection.clone());
        }
        for (key, experience) in &write_set.upserts {
            replace_or_prepend(&mut experiences, key, experience.clone());
        }
        for write in &write_set.ledger {
            match write {
                LedgerWrite::Write(id, record) => ledger.write(id, record.clone()),
                LedgerWrite::MarkDirty(id, patch) => ledger.mark_dirty(id, patch.clone()),
                LedgerWrite::Clear(id) => ledger.clear_aggregate(id),
            }
        }
        sync_errors.apply(write_set.sync_errors.clone());
    }

    async fn persist(&self) -> Result<()> {
        let Some(database) = &self.database else {
            return Ok(());
        };

        let (experiences, connections, ledger, sync_errors) = {
            let experiences = self.experiences.read().await;
            let connections = self.connections.read().await;
            (
                experiences.clone(),
                connections.clone(),
                self.ledger.read_all().await,
                self.sync_errors.read_all().await,
            )
        };

        database.put_value(EXPERIENCES_KEY, &experiences).await?;
        database.put_value(ENTRIES_KEY, &connections).await?;
        database.put_value(LEDGER_KEY, &ledger).await?;
        database.put_value(SYNC_ERRORS_KEY, &sync_errors).await?;

        tracing::debug!(experiences = experiences.len(), "persisted local cache");
        Ok(())
    }

    async fn record_sync_completed(&self) -> Result<()> {
        match &self.database {
            Some(database) => database.set_last_sync_time().await,
            None => Ok(()),
        }
    }
}
