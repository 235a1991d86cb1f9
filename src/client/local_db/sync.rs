//! Sync Metadata
//!
//! Facts about synchronization itself (so far only when the server last
//! answered a cycle), kept in their own table next to the cached journal.

use chrono::{DateTime, Utc};

use super::{LocalDatabase, Result};

const LAST_SYNC_KEY: &str = "last_sync_time";

impl LocalDatabase {
    /// Upsert one metadata value
    pub async fn set_sync_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_metadata (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_sync_metadata(&self, key: &str) -> Result<Option<String>> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT value FROM sync_metadata WHERE key = ?")
                .bind(key)
                .fetch_optional(self.pool())
                .await?;
        Ok(value.map(|(value,)| value))
    }

    /// When the server last answered a cycle. Unparseable values read as
    /// never synced.
    pub async fn get_last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        let value = self.get_sync_metadata(LAST_SYNC_KEY).await?;
        Ok(value
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|t| t.with_timezone(&Utc)))
    }

    /// Stamp the current time as the last sync
    pub async fn set_last_sync_time(&self) -> Result<()> {
        self.set_sync_metadata(LAST_SYNC_KEY, &Utc::now().to_rfc3339())
            .await
    }
}
