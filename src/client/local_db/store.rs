//! Local Store Contract
//!
//! What the sync engine needs from the local cache. Experiences are kept in
//! one ordered list; their entry connections, the ledger and the sync error
//! store are keyed by experience id.
//!
//! Local edits and the write-back of a sync cycle both hold
//! [`LocalStore::commit_lock`], so an edit never lands between the
//! cycle's re-read of the store and its write-set.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::Result;
use crate::client::offline::ledger::UnsyncedLedger;
use crate::client::offline::reconciliation::WriteSet;
use crate::client::offline::sync_errors::SyncErrorStore;
use crate::shared::journal::{EntryConnection, Experience};

#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn read_experience(&self, experience_id: &str) -> Option<Experience>;

    /// Replace the experience with the same id in place, or prepend it
    async fn write_experience(&self, experience: Experience);

    async fn read_entries(&self, experience_id: &str) -> Option<EntryConnection>;

    async fn write_entries(&self, experience_id: &str, connection: EntryConnection);

    /// For each `(key, experience)`: replace the experience whose id is `key`
    /// in place, or prepend when no experience has that id
    async fn upsert_experiences(&self, pairs: Vec<(String, Experience)>);

    /// Every cached experience in list order
    async fn list_experiences(&self) -> Vec<Experience>;

    fn ledger(&self) -> &UnsyncedLedger;

    fn sync_errors(&self) -> &SyncErrorStore;

    /// Serializes local edits with the write-back of a sync cycle
    fn commit_lock(&self) -> &Mutex<()>;

    /// Apply every change in `write_set` as one update. Readers see the
    /// store either before or after it, never in between.
    async fn apply_write_set(&self, write_set: &WriteSet);

    /// Write the cached state to durable storage, if any is attached
    async fn persist(&self) -> Result<()>;

    /// Note that a cycle got a response from the server
    async fn record_sync_completed(&self) -> Result<()> {
        Ok(())
    }
}
