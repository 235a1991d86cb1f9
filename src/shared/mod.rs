//! Shared Module
//!
//! This module contains the types shared by every layer of the sync engine:
//! the journal data model, the sync-completed event, configuration and the
//! I/O error types. All model types serialize in the camelCase shape the
//! remote API speaks, so the same values travel over HTTP and into the cache.

/// Journal data model (experiences, entries, connections)
pub mod journal;

/// Sync-completed event broadcast after each cycle
pub mod event;

/// Shared error types
pub mod error;

/// Engine configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
pub use error::{EditError, EngineError, RemoteError, StoreError};
pub use event::{OnlineStatus, SyncCompletedEvent};
pub use journal::{
    Comment, DataDefinition, DataObject, DataType, DataValue, Entry, EntryConnection, Experience,
};
