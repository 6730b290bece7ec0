//! Links provider session changes to the auth namespace and the stores.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::key::AuthKeyResolver;
use super::provider::{AuthProvider, Session};
use crate::models::Namespace;
use crate::store::{ProgressStore, TreatmentStore};

/// Keeps the namespace of every store in step with the signed-in user.
pub struct AuthBridge {
    provider: Arc<dyn AuthProvider>,
    resolver: Arc<AuthKeyResolver>,
    treatments: Arc<TreatmentStore>,
    progress: Arc<ProgressStore>,
}

impl AuthBridge {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        resolver: Arc<AuthKeyResolver>,
        treatments: Arc<TreatmentStore>,
        progress: Arc<ProgressStore>,
    ) -> Self {
        Self {
            provider,
            resolver,
            treatments,
            progress,
        }
    }

    /// Set the namespace for `user_id` (anonymous for `None`) and reload both
    /// stores when it differs from the one they hold.
    pub async fn apply_user(&self, user_id: Option<&str>) -> Namespace {
        let namespace = self.resolver.set_user(user_id).await;

        if self.treatments.namespace() == namespace && self.progress.namespace() == namespace {
            return namespace;
        }

        tokio::join!(
            self.treatments.rehydrate_for(namespace.clone()),
            self.progress.rehydrate_for(namespace.clone()),
        );
        namespace
    }

    /// Apply whatever session the provider currently holds. Provider errors
    /// leave the namespace as it is.
    pub async fn sync_current(&self) -> Namespace {
        match self.provider.current_session().await {
            Ok(session) => self.apply_user(session.as_ref().map(Session::user_id)).await,
            Err(e) => {
                tracing::warn!("Could not read auth session, keeping namespace: {}", e);
                self.resolver.resolve().await
            }
        }
    }

    /// Sync once, then follow every provider event until the provider goes
    /// away.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        // Subscribe before the initial sync so no event falls in between.
        let mut events = self.provider.subscribe();

        tokio::spawn(async move {
            self.sync_current().await;

            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::debug!(kind = ?event.kind, "Auth event");
                        self.apply_user(event.user_id()).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth events lagged, resyncing");
                        self.sync_current().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Auth bridge stopped");
        })
    }
}
