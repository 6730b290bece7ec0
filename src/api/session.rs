//! Session endpoints: sign-in, sign-up, sign-out.

use axum::{extract::State, Json};
use serde::Serialize;

use super::{error, success, ApiResult};
use crate::auth::{AuthUser, Credentials, Session};
use crate::errors::AppError;
use crate::AppState;

/// Who is signed in. The namespace travels in the envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub signed_in: bool,
    pub user: Option<AuthUser>,
    /// Sign-up accepted but the email still needs confirming
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub confirmation_pending: bool,
}

impl SessionView {
    fn from_session(session: Option<Session>) -> Self {
        Self {
            signed_in: session.is_some(),
            user: session.map(|s| s.user),
            confirmation_pending: false,
        }
    }
}

fn validate_credentials(credentials: &Credentials) -> Result<(), AppError> {
    let email = credentials.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if credentials.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }
    Ok(())
}

/// GET /api/session - Current session.
pub async fn get_session(State(state): State<AppState>) -> ApiResult<SessionView> {
    match state.auth.current_session().await {
        Ok(session) => success(SessionView::from_session(session), state.namespace_key()),
        Err(e) => error(e.into(), state.namespace_key()),
    }
}

/// POST /api/session/sign-in - Sign in and switch to the user's namespace.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<SessionView> {
    if let Err(e) = validate_credentials(&credentials) {
        return error(e, state.namespace_key());
    }

    match state.auth.sign_in(&credentials).await {
        Ok(session) => {
            state.bridge.apply_user(Some(session.user_id())).await;
            success(
                SessionView::from_session(Some(session)),
                state.namespace_key(),
            )
        }
        Err(e) => error(e.into(), state.namespace_key()),
    }
}

/// POST /api/session/sign-up - Create an account.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<SessionView> {
    if let Err(e) = validate_credentials(&credentials) {
        return error(e, state.namespace_key());
    }

    match state.auth.sign_up(&credentials).await {
        Ok(Some(session)) => {
            state.bridge.apply_user(Some(session.user_id())).await;
            success(
                SessionView::from_session(Some(session)),
                state.namespace_key(),
            )
        }
        Ok(None) => success(
            SessionView {
                signed_in: false,
                user: None,
                confirmation_pending: true,
            },
            state.namespace_key(),
        ),
        Err(e) => error(e.into(), state.namespace_key()),
    }
}

/// POST /api/session/sign-out - Sign out and fall back to anonymous.
pub async fn sign_out(State(state): State<AppState>) -> ApiResult<SessionView> {
    // The local session is gone even when the provider call fails.
    if let Err(e) = state.auth.sign_out().await {
        tracing::warn!("Provider sign-out failed: {}", e);
    }
    state.bridge.apply_user(None).await;

    success(SessionView::from_session(None), state.namespace_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_validate_credentials() {
        assert!(validate_credentials(&credentials("ana@example.com", "pw")).is_ok());
        assert!(validate_credentials(&credentials("  ", "pw")).is_err());
        assert!(validate_credentials(&credentials("ana", "pw")).is_err());
        assert!(validate_credentials(&credentials("ana@example.com", "")).is_err());
    }

    #[test]
    fn test_session_view_shape() {
        let value = serde_json::to_value(SessionView::from_session(None)).unwrap();
        assert_eq!(value["signedIn"], false);
        assert!(value["user"].is_null());
        assert!(value.get("confirmationPending").is_none());
    }
}
