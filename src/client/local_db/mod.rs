//! # Local Database Module
//!
//! Local storage for offline-first operation. The engine works against the
//! `LocalStore` contract; `LocalCache` implements it in memory and, when
//! attached to a `LocalDatabase`, persists its state to SQLite.
//!
//! ## Key Components
//!
//! - `store.rs`: the `LocalStore` contract the engine depends on
//! - `cache.rs`: in-memory `LocalStore` with durable persist/restore
//! - `schema.rs`: table definitions and schema versioning
//! - `sync.rs`: synchronization metadata (last sync time)
//! - `LocalDatabase`: SQLite pool and the `cache_entries` key-value table
//!
//! ## Usage
//!
//! ```rust,no_run
//! use journal_sync::client::local_db::{LocalCache, LocalDatabase};
//!
//! # async fn example() -> Result<(), journal_sync::shared::StoreError> {
//! let db = LocalDatabase::open("/tmp/journal.db").await?;
//! let cache = LocalCache::restore(db).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod schema;
pub mod store;
pub mod sync;

pub use cache::LocalCache;
pub use store::LocalStore;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::shared::error::StoreError;

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Local database connection manager
///
/// Manages the SQLite connection pool, the schema and the key-value table
/// the cache persists into.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database at `path`
    ///
    /// Creates the parent directory and the file if needed. Uses WAL mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await?;
        sqlx::query("PRAGMA temp_store=MEMORY").execute(&pool).await?;

        let db = Self { pool };
        db.init_schema().await?;
        tracing::debug!(path = %path.display(), "opened local database");
        Ok(db)
    }

    /// Private in-memory database, mainly for tests
    pub async fn in_memory() -> Result<Self> {
        // every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(schema::CREATE_MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await?;

        let applied = self.schema_version().await?;
        for migration in schema::pending(applied) {
            let mut tx = self.pool.begin().await?;
            for statement in migration.statements {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(migration.version)
                .bind(Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::info!(version = migration.version, "applied local database migration");
        }

        Ok(())
    }

    /// Highest applied migration
    pub async fn schema_version(&self) -> Result<i32> {
        let (version,): (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Underlying SQLite pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store `value` as JSON under `key`
    pub async fn put_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT OR REPLACE INTO cache_entries (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Read the JSON value under `key`
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row = sqlx::query("SELECT value FROM cache_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("value")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    pub async fn delete_value(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
