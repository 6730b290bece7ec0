//! Remote auth session provider contract.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the session event channel.
pub const AUTH_EVENT_CAPACITY: usize = 16;

/// Why an auth call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Wrong email/password or an expired refresh token
    InvalidCredentials,
    /// The provider refused the request (weak password, user exists, ...)
    Rejected,
    /// Provider unreachable or returned garbage
    Network,
    /// No remote auth configured
    NotConfigured,
}

impl AuthErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorKind::InvalidCredentials => "invalid_credentials",
            AuthErrorKind::Rejected => "rejected",
            AuthErrorKind::Network => "network",
            AuthErrorKind::NotConfigured => "not_configured",
        }
    }
}

/// Auth failure with a message fit for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InvalidCredentials, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Rejected, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Network, message)
    }

    pub fn not_configured() -> Self {
        Self::new(
            AuthErrorKind::NotConfigured,
            "Sign-in is unavailable: remote auth is not configured",
        )
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AuthError {}

/// The signed-in user as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Opaque provider id
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Whether the session expires within `margin_secs` of `now`.
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at
            .map(|at| at - now <= margin_secs)
            .unwrap_or(false)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Email/password pair.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Broadcast on every session change.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(Session::user_id)
    }
}

/// Remote auth provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The current session, if signed in.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Receive every later session change.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// `None` when the provider requires email confirmation first.
    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Provider used when no remote auth is configured: never signed in.
pub struct OfflineAuth {
    events: broadcast::Sender<AuthEvent>,
}

impl OfflineAuth {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self { events }
    }
}

impl Default for OfflineAuth {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for OfflineAuth {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(None)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in(&self, _credentials: &Credentials) -> Result<Session, AuthError> {
        Err(AuthError::not_configured())
    }

    async fn sign_up(&self, _credentials: &Credentials) -> Result<Option<Session>, AuthError> {
        Err(AuthError::not_configured())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let _ = self.events.send(AuthEvent {
            kind: AuthEventKind::SignedOut,
            session: None,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: Option<i64>) -> Session {
        Session {
            access_token: "secret-access".into(),
            refresh_token: "secret-refresh".into(),
            expires_at,
            user: AuthUser {
                id: "u1".into(),
                email: Some("a@b.c".into()),
            },
        }
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(None));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("u1"));
    }

    #[test]
    fn test_expires_within() {
        assert!(session(Some(1_000)).expires_within(950, 60));
        assert!(!session(Some(1_000)).expires_within(900, 60));
        assert!(!session(None).expires_within(i64::MAX, 60));
    }

    #[tokio::test]
    async fn test_offline_auth() {
        let auth = OfflineAuth::new();
        let mut events = auth.subscribe();
        let credentials = Credentials {
            email: "a@b.c".into(),
            password: "pw".into(),
        };

        assert!(auth.current_session().await.unwrap().is_none());
        let err = auth.sign_in(&credentials).await.unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::NotConfigured);

        auth.sign_out().await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedOut);
        assert!(event.user_id().is_none());
    }
}
