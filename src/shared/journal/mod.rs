//! Journal Module
//!
//! This module contains the data structures the sync engine moves between
//! the local cache and the remote API:
//!
//! - `Experience` - The top-level aggregate with its schema of definitions
//! - `DataDefinition` - A typed field of an experience's schema
//! - `Entry` - One instance of an experience's schema
//! - `DataObject` - One typed value of an entry
//! - `EntryConnection` - The paginated, newest-first list of entries
//!
//! # Usage
//!
//! ```rust
//! use journal_sync::shared::journal::{Experience, Entry, EntryConnection};
//! ```

pub mod connection;
pub mod entry;
pub mod experience;

// Re-export all types
pub use connection::{EntryConnection, EntryEdge, PageInfo};
pub use entry::{DataObject, DataValue, Entry};
pub use experience::{Comment, DataDefinition, DataType, Experience};
