//! # Sync Flag
//!
//! Process-wide coordination state for sync cycles: whether syncing is
//! allowed at all (`can_sync`) and whether a cycle is running
//! (`is_syncing`). [`SyncFlag::try_acquire`] checks and sets in one critical
//! section and hands back a guard that clears `is_syncing` when dropped, so
//! every exit path of a cycle releases it.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub can_sync: bool,
    pub is_syncing: bool,
    /// One-shot handoff for screens showing an experience by its offline id
    pub online_experience_id_to_offline_id: Option<BTreeMap<String, String>>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            can_sync: true,
            is_syncing: false,
            online_experience_id_to_offline_id: None,
        }
    }
}

/// Partial update for [`SyncFlag::set`]
#[derive(Debug, Clone, Default)]
pub struct SyncStatePatch {
    pub can_sync: Option<bool>,
    pub is_syncing: Option<bool>,
}

/// Why a cycle could not start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("sync is paused")]
    Paused,
    #[error("a sync cycle is already running")]
    Busy,
}

#[derive(Debug, Default)]
pub struct SyncFlag {
    state: Mutex<SyncState>,
}

impl SyncFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current state
    pub fn get(&self) -> SyncState {
        self.state.lock().clone()
    }

    /// Shallow merge of `patch`
    pub fn set(&self, patch: SyncStatePatch) {
        let mut state = self.state.lock();
        if let Some(can_sync) = patch.can_sync {
            state.can_sync = can_sync;
        }
        if let Some(is_syncing) = patch.is_syncing {
            state.is_syncing = is_syncing;
        }
    }

    pub fn can_sync(&self) -> bool {
        self.state.lock().can_sync
    }

    pub fn is_syncing(&self) -> bool {
        self.state.lock().is_syncing
    }

    /// Start a cycle if allowed and none is running
    pub fn try_acquire(self: &Arc<Self>) -> Result<SyncGuard, AcquireError> {
        let mut state = self.state.lock();
        if !state.can_sync {
            return Err(AcquireError::Paused);
        }
        if state.is_syncing {
            return Err(AcquireError::Busy);
        }
        state.is_syncing = true;
        Ok(SyncGuard {
            flag: Arc::clone(self),
        })
    }

    pub fn release(&self) {
        self.state.lock().is_syncing = false;
    }

    /// Prevent future cycles. A running cycle is not interrupted.
    pub fn pause(&self) {
        self.state.lock().can_sync = false;
    }

    pub fn resume(&self) {
        self.state.lock().can_sync = true;
    }

    pub fn record_online_id_for_offline_id(&self, online_id: &str, offline_id: &str) {
        self.state
            .lock()
            .online_experience_id_to_offline_id
            .get_or_insert_with(BTreeMap::new)
            .insert(online_id.to_string(), offline_id.to_string());
    }

    /// Read and forget the offline id recorded for `online_id`
    pub fn take_offline_id_for_online_id(&self, online_id: &str) -> Option<String> {
        let mut state = self.state.lock();
        let map = state.online_experience_id_to_offline_id.as_mut()?;
        let offline_id = map.remove(online_id);
        if map.is_empty() {
            state.online_experience_id_to_offline_id = None;
        }
        offline_id
    }
}

/// Ownership of the running cycle; releases the flag on drop
#[derive(Debug)]
pub struct SyncGuard {
    flag: Arc<SyncFlag>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.flag.release();
    }
}
