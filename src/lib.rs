//! journal-sync - Offline-First Sync Engine
//!
//! journal-sync is the client-side synchronization engine of a personal
//! journaling service. Users create experiences (records with a schema of
//! typed data definitions) and entries (instances of that schema) while
//! possibly disconnected; this library reconciles those local edits with the
//! remote API without losing data.
//!
//! # Overview
//!
//! The engine:
//! - tracks which fields of which experiences are dirty (the unsynced ledger)
//! - batches dirty experiences into one create and/or update request per cycle
//! - merges the server's per-field, per-entry and per-data-object outcomes
//!   back into the local store, recording failures as sync errors
//! - remaps offline ids to server ids once an offline experience is accepted
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared by every layer
//!   - Journal data model, sync-completed event
//!   - Configuration and error types
//!
//! - **`client`** - The engine itself
//!   - `offline`: id scheme, ledger, sync error store, local edit recorder
//!     and the update/create reconcilers
//!   - `sync`: sync flag, orchestrator, background sync service
//!   - `local_db`: local store contract, in-memory cache, SQLite persistence
//!   - `remote`: remote API contract, wire types and the HTTP client
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use journal_sync::client::local_db::LocalCache;
//! use journal_sync::client::remote::HttpRemoteApi;
//! use journal_sync::client::sync::SyncService;
//! use journal_sync::shared::SyncConfig;
//!
//! # async fn example() -> Result<(), journal_sync::shared::EngineError> {
//! let config = SyncConfig::from_env()?;
//! let store = Arc::new(LocalCache::new());
//! let remote = Arc::new(HttpRemoteApi::new(&config)?);
//!
//! let mut service = SyncService::new(store, remote, &config);
//! service.start();
//! service.request_sync();
//! # Ok(())
//! # }
//! ```

pub mod shared;
pub mod client;
