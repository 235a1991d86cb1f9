//! Database Schema Definitions
//!
//! Every table the cache database holds, grouped by the migration that
//! introduced it. A fresh database replays all of them in order.

/// A numbered set of statements applied once per database
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i32,
    pub statements: &'static [&'static str],
}

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    statements: &[
        // journal state as JSON documents, see `LocalCache`
        "CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS sync_metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ],
}];

/// Bookkeeping table, created before any migration runs
pub const CREATE_MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

/// Version a fully migrated database reports
pub fn latest_version() -> i32 {
    MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0)
}

/// Migrations newer than `applied`, oldest first
pub fn pending(applied: i32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version > applied)
}
