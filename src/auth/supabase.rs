//! GoTrue (Supabase auth) client.
//!
//! Persists the session in device storage and refreshes it shortly before it
//! expires, so a restart resumes the previous session.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, Mutex};

use super::provider::{
    AuthError, AuthErrorKind, AuthEvent, AuthEventKind, AuthProvider, AuthUser, Credentials,
    Session, AUTH_EVENT_CAPACITY,
};
use crate::config::SupabaseConfig;
use crate::db::KeyValueStore;

/// Storage key holding the serialized session.
pub const SESSION_STORAGE_KEY: &str = "keepr-auth-session";

/// Refresh when the access token expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Default)]
struct SessionSlot {
    loaded: bool,
    session: Option<Session>,
}

/// Auth provider backed by a GoTrue REST endpoint.
pub struct SupabaseAuth {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    storage: Arc<dyn KeyValueStore>,
    slot: Mutex<SessionSlot>,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig, storage: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            http: reqwest::Client::new(),
            base_url: config.url,
            anon_key: config.anon_key,
            storage,
            slot: Mutex::new(SessionSlot::default()),
            events,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, AuthError> {
        let mut request = self
            .http
            .post(self.url(path))
            .header("apikey", &self.anon_key)
            .json(&body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::network(format!("Auth service unreachable: {}", e)))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn request_token(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, AuthError> {
        let response = self
            .post(&format!("/token?grant_type={}", grant_type), body, None)
            .await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::network(format!("Unexpected auth response: {}", e)))?;
        Ok(token.into_session())
    }

    async fn load_persisted(&self) -> Option<Session> {
        match self.storage.get(SESSION_STORAGE_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .map_err(|e| tracing::warn!("Discarding unreadable stored session: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to load stored session: {}", e);
                None
            }
        }
    }

    async fn persist(&self, session: Option<&Session>) {
        let result = match session {
            Some(session) => match serde_json::to_string(session) {
                Ok(raw) => self.storage.set(SESSION_STORAGE_KEY, &raw).await,
                Err(e) => {
                    tracing::warn!("Failed to serialize session: {}", e);
                    return;
                }
            },
            None => self.storage.remove(SESSION_STORAGE_KEY).await,
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist session: {}", e);
        }
    }

    /// Store `session` and broadcast the change.
    async fn replace_session(
        &self,
        slot: &mut SessionSlot,
        session: Option<Session>,
        kind: AuthEventKind,
    ) {
        self.persist(session.as_ref()).await;
        slot.loaded = true;
        slot.session = session.clone();
        let _ = self.events.send(AuthEvent { kind, session });
    }
}

async fn error_from_response(response: reqwest::Response) -> AuthError {
    let status = response.status();
    let body: ErrorBody = response.json().await.unwrap_or_default();

    let message = body
        .error_description
        .or(body.msg)
        .or(body.message)
        .or_else(|| body.error.clone())
        .unwrap_or_else(|| format!("Auth request failed with status {}", status.as_u16()));

    let bad_grant = body.error.as_deref() == Some("invalid_grant")
        || matches!(
            body.error_code.as_deref(),
            Some("invalid_credentials") | Some("refresh_token_not_found")
        );

    let kind = if bad_grant || status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
    {
        AuthErrorKind::InvalidCredentials
    } else if status.is_server_error() {
        AuthErrorKind::Network
    } else {
        AuthErrorKind::Rejected
    };

    AuthError::new(kind, message)
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let mut slot = self.slot.lock().await;
        if !slot.loaded {
            slot.session = self.load_persisted().await;
            slot.loaded = true;
        }
        let Some(session) = slot.session.clone() else {
            return Ok(None);
        };

        if !session.expires_within(Utc::now().timestamp(), REFRESH_MARGIN_SECS) {
            return Ok(Some(session));
        }

        let refreshed = self
            .request_token(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token }),
            )
            .await;
        match refreshed {
            Ok(fresh) => {
                tracing::info!(user = %fresh.user.id, "Session refreshed");
                self.replace_session(&mut slot, Some(fresh.clone()), AuthEventKind::TokenRefreshed)
                    .await;
                Ok(Some(fresh))
            }
            Err(e) if e.kind == AuthErrorKind::InvalidCredentials => {
                tracing::info!("Refresh token rejected, signing out: {}", e);
                self.replace_session(&mut slot, None, AuthEventKind::SignedOut)
                    .await;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Session refresh failed, keeping current session: {}", e);
                Ok(Some(session))
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let session = self
            .request_token(
                "password",
                json!({ "email": credentials.email, "password": credentials.password }),
            )
            .await?;

        tracing::info!(user = %session.user.id, "Signed in");
        let mut slot = self.slot.lock().await;
        self.replace_session(&mut slot, Some(session.clone()), AuthEventKind::SignedIn)
            .await;
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>, AuthError> {
        let response = self
            .post(
                "/signup",
                json!({ "email": credentials.email, "password": credentials.password }),
                None,
            )
            .await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::network(format!("Unexpected auth response: {}", e)))?;

        if body.get("access_token").is_none() {
            tracing::info!("Sign-up accepted, confirmation pending");
            return Ok(None);
        }

        let session = serde_json::from_value::<TokenResponse>(body)
            .map_err(|e| AuthError::network(format!("Unexpected auth response: {}", e)))?
            .into_session();
        tracing::info!(user = %session.user.id, "Signed up");
        let mut slot = self.slot.lock().await;
        self.replace_session(&mut slot, Some(session.clone()), AuthEventKind::SignedIn)
            .await;
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut slot = self.slot.lock().await;
        if !slot.loaded {
            slot.session = self.load_persisted().await;
        }

        // Local session goes away even if the remote call fails.
        let remote = match slot.session.as_ref() {
            Some(session) => self
                .post("/logout", json!({}), Some(&session.access_token))
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        self.replace_session(&mut slot, None, AuthEventKind::SignedOut)
            .await;

        if let Err(e) = &remote {
            tracing::warn!("Remote sign-out failed: {}", e);
        }
        remote
    }
}
