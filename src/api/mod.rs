//! Local REST API.
//!
//! Thin JSON surface over the stores for a UI shell. Every response carries
//! the namespace it was served under.

mod lifecycle;
mod progress;
mod session;
mod treatments;

pub use lifecycle::*;
pub use progress::*;
pub use session::*;
pub use treatments::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, AppErrorWithNamespace};

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub namespace: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, namespace: String) -> Self {
        Self {
            success: true,
            data,
            namespace,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithNamespace>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, namespace: String) -> ApiResult<T> {
    Ok(ApiResponse::new(data, namespace))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, namespace: String) -> ApiResult<T> {
    Err(AppErrorWithNamespace {
        error: err,
        namespace,
    })
}
