//! Keepr local service
//!
//! Runs the state core on SQLite device storage and serves the local JSON API.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use keepr::auth::{
    AuthProvider, OfflineAuth, SessionRefresher, SupabaseAuth, SESSION_CHECK_INTERVAL,
};
use keepr::config::Config;
use keepr::db::{self, KeyValueStore, SqliteStore};
use keepr::rollover::{RolloverWatcher, SystemClock};
use keepr::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Keepr");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Day boundary: {:?}", config.day_boundary);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (KEEPR_API_PSK). Authentication is disabled!");
    }

    // Initialize device storage
    let pool = db::init_database(&config.db_path).await?;
    let storage: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::new(pool));

    let auth: Arc<dyn AuthProvider> = match config.supabase.clone() {
        Some(supabase) => {
            tracing::info!("Remote auth: {}", supabase.url);
            Arc::new(SupabaseAuth::new(supabase, storage.clone()))
        }
        None => {
            tracing::warn!(
                "No remote auth configured (KEEPR_SUPABASE_URL). Running anonymous only"
            );
            Arc::new(OfflineAuth::new())
        }
    };

    let clock = Arc::new(SystemClock::new(config.day_boundary));
    let state = AppState::new(config.clone(), storage, auth, clock).await;
    tracing::info!("Active namespace: {}", state.namespace_key());

    let bridge = state.bridge.clone().spawn();
    let refresher = SessionRefresher::spawn(state.auth.clone(), SESSION_CHECK_INTERVAL);
    let watcher = RolloverWatcher::spawn(
        state.rollover.clone(),
        config.rollover_interval,
        state.lifecycle.subscribe(),
    );

    // Build router
    let app = create_router(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    refresher.shutdown().await;
    bridge.abort();
    watcher.shutdown().await;
    state.flush().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
