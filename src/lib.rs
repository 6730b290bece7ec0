//! Keepr
//!
//! State core for a personal habit/treatment tracker: per-user persisted
//! treatment and progress stores, daily checklist with streaks, day rollover
//! and auth-driven namespace switching, exposed through a local JSON API.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod picker;
pub mod rollover;
pub mod store;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::{AuthBridge, AuthKeyResolver, AuthProvider, PskAuth};
use config::Config;
use db::KeyValueStore;
use rollover::{Clock, DayRollover, Lifecycle};
use store::{ProgressStore, TreatmentStore};

/// Capacity of the lifecycle event channel.
const LIFECYCLE_CAPACITY: usize = 16;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<dyn AuthProvider>,
    pub auth_key: Arc<AuthKeyResolver>,
    pub treatments: Arc<TreatmentStore>,
    pub progress: Arc<ProgressStore>,
    pub bridge: Arc<AuthBridge>,
    pub rollover: Arc<DayRollover>,
    pub lifecycle: broadcast::Sender<Lifecycle>,
}

impl AppState {
    /// Wire up the stores on `storage` and load the last used namespace.
    pub async fn new(
        config: Config,
        storage: Arc<dyn KeyValueStore>,
        auth: Arc<dyn AuthProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let auth_key = Arc::new(AuthKeyResolver::new(storage.clone()));
        let namespace = auth_key.resolve().await;

        let treatments = Arc::new(TreatmentStore::new(
            storage.clone(),
            clock.clone(),
            namespace.clone(),
        ));
        let progress = Arc::new(ProgressStore::new(
            storage,
            clock.clone(),
            namespace.clone(),
        ));
        tokio::join!(
            treatments.rehydrate_for(namespace.clone()),
            progress.rehydrate_for(namespace),
        );

        let bridge = Arc::new(AuthBridge::new(
            auth.clone(),
            auth_key.clone(),
            treatments.clone(),
            progress.clone(),
        ));
        let rollover = Arc::new(DayRollover::new(clock, treatments.clone()));
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);

        Self {
            config: Arc::new(config),
            auth,
            auth_key,
            treatments,
            progress,
            bridge,
            rollover,
            lifecycle,
        }
    }

    /// Key of the namespace the stores currently serve.
    pub fn namespace_key(&self) -> String {
        self.treatments.namespace().key()
    }

    /// Wait for every queued store write.
    pub async fn flush(&self) {
        tokio::join!(self.treatments.flush(), self.progress.flush());
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = PskAuth {
        expected_psk: state.config.api_psk.clone(),
        resolver: state.auth_key.clone(),
    };

    // API routes
    let api_routes = Router::new()
        // Session
        .route("/session", get(api::get_session))
        .route("/session/sign-in", post(api::sign_in))
        .route("/session/sign-up", post(api::sign_up))
        .route("/session/sign-out", post(api::sign_out))
        // Treatments
        .route("/treatments", get(api::list_treatments))
        .route("/treatments", post(api::create_treatment))
        .route("/treatments/{id}", delete(api::delete_treatment))
        .route("/today/{id}/toggle", post(api::toggle_today))
        // Progress
        .route("/progress", get(api::get_progress))
        .route("/progress/photos", post(api::add_photo))
        .route("/progress/photos/{id}", delete(api::delete_photo))
        .route("/progress/checks", put(api::upsert_check))
        .route("/progress/metrics", get(api::get_metrics))
        // App
        .route("/lifecycle", post(api::report_lifecycle))
        .route("/data", delete(api::clear_data))
        // Apply PSK auth middleware
        .layer(middleware::from_fn_with_state(psk, auth::psk_auth_layer));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
