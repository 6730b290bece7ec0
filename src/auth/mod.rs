//! Authentication.
//!
//! Two unrelated concerns live here: the PSK gate in front of the local API,
//! and the user session that decides which namespace the stores use.

mod bridge;
mod key;
mod provider;
mod refresh;
mod supabase;

pub use bridge::*;
pub use key::*;
pub use provider::*;
pub use refresh::*;
pub use supabase::*;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, AppErrorWithNamespace};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// State for [`psk_auth_layer`].
#[derive(Clone)]
pub struct PskAuth {
    pub expected_psk: Option<String>,
    pub resolver: Arc<AuthKeyResolver>,
}

/// PSK authentication layer for the local API.
pub async fn psk_auth_layer(
    State(auth): State<PskAuth>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = auth.expected_psk.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
        .map(str::to_owned);

    match provided.as_deref() {
        Some(key) if constant_time_compare(key, expected) => next.run(request).await,
        Some(_) => unauthorized_response(&auth, "Invalid API key"),
        None => unauthorized_response(&auth, "Missing or invalid API key"),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(auth: &PskAuth, message: &str) -> Response {
    let namespace = auth.resolver.current().unwrap_or_default();
    AppErrorWithNamespace {
        error: AppError::Unauthorized(message.to_string()),
        namespace: namespace.key(),
    }
    .into_response()
}
