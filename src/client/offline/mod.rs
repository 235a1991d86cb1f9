//! # Offline Journaling
//!
//! Offline-first editing and the bookkeeping that lets the sync cycle merge
//! the server's answer back without losing data.
//!
//! ## Key Components
//!
//! - `ids.rs`: offline identifier scheme
//! - `ledger.rs`: which fields of which experiences are dirty
//! - `sync_errors.rs`: what the last reconciliation failed on
//! - `optimistic.rs`: local edits that update the store and the ledger
//! - `reconciliation/`: merging server outcomes back into local state

pub mod ids;
pub mod ledger;
pub mod optimistic;
pub mod reconciliation;
pub mod sync_errors;

// Re-export main types
pub use ledger::{UnsyncedLedger, UnsyncedModifiedExperience};
pub use optimistic::OfflineEditor;
pub use reconciliation::{LedgerWrite, WriteSet};
pub use sync_errors::{SyncError, SyncErrorStore};
