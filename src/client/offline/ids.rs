//! # Offline Identifiers
//!
//! Ids minted on the client before the server has seen a record. They carry
//! a reserved prefix the server never issues, so telling offline ids from
//! server ids needs no lookup. Entry and data object ids are derived from
//! their parent id and position, so two passes over the same unsynced data
//! produce the same ids.

use std::fmt::Display;
use uuid::Uuid;

/// Prefix reserved for client-generated ids
pub const OFFLINE_ID_PREFIX: &str = "offline:";

/// Whether `id` was generated on the client
pub fn is_offline_id(id: &str) -> bool {
    id.starts_with(OFFLINE_ID_PREFIX)
}

/// Offline id for an experience or definition. Already-offline seeds are
/// returned unchanged.
pub fn make_offline_id(seed: impl Display) -> String {
    let seed = seed.to_string();
    if is_offline_id(&seed) {
        seed
    } else {
        format!("{OFFLINE_ID_PREFIX}{seed}")
    }
}

/// Offline id with a fresh random seed
pub fn new_offline_id() -> String {
    make_offline_id(Uuid::new_v4())
}

/// Offline id of the entry at `index` under `experience_id`
pub fn make_offline_entry_id(experience_id: &str, index: usize) -> String {
    format!("{OFFLINE_ID_PREFIX}{}/entries/{index}", strip_prefix(experience_id))
}

/// Offline id of the data object at `index` under `entry_id`
pub fn make_offline_data_object_id(entry_id: &str, index: usize) -> String {
    format!("{OFFLINE_ID_PREFIX}{}/objects/{index}", strip_prefix(entry_id))
}

fn strip_prefix(id: &str) -> &str {
    id.strip_prefix(OFFLINE_ID_PREFIX).unwrap_or(id)
}
