//! Client Module
//!
//! The offline-first sync engine: everything between a local edit and the
//! server's acknowledgement of it.

pub mod local_db;
pub mod offline;
pub mod remote;
pub mod sync;
