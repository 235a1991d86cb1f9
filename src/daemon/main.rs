/**
 * journal-syncd Entry Point
 *
 * Runs the sync engine as a background process: restores the local cache
 * from SQLite, syncs it with the journal server until Ctrl-C, then persists.
 */

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};

use journal_sync::client::local_db::{LocalCache, LocalDatabase, LocalStore};
use journal_sync::client::remote::HttpRemoteApi;
use journal_sync::client::sync::SyncService;
use journal_sync::shared::event::SyncCompletedEvent;
use journal_sync::shared::{EngineError, SyncConfig};

/// Log each completed cycle until the service goes away. Returns how many
/// events were logged.
async fn log_sync_events(mut events: broadcast::Receiver<SyncCompletedEvent>) -> usize {
    let mut logged = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                let errors = event.sync_errors.as_ref().map_or(0, |errors| errors.len());
                let remapped = event
                    .offline_id_to_online_experience
                    .as_ref()
                    .map_or(0, |map| map.len());
                tracing::info!(errors, remapped, "sync completed");
                logged += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log fell behind; skipped sync events");
            }
            Err(RecvError::Closed) => return logged,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let config = SyncConfig::from_env()?;

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let database_path = config.database_path();
    tracing::info!(path = %database_path.display(), "opening local database");
    let database = LocalDatabase::open(&database_path).await?;
    if let Some(last_sync) = database.get_last_sync_time().await? {
        tracing::info!(%last_sync, "last successful sync");
    }

    let store = Arc::new(LocalCache::restore(database).await?);
    let remote = Arc::new(HttpRemoteApi::new(&config)?);
    tracing::info!(server = %config.server_url, "starting sync engine");

    let mut service = SyncService::new(store.clone(), remote, &config);
    let events = service.subscribe();
    service.start();

    let event_log = tokio::spawn(log_sync_events(events));

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }

    tracing::info!("shutting down");
    service.stop().await;
    event_log.abort();
    store.persist().await?;

    Ok(())
}
