//! Progress endpoints: photos, weekly checks and headline metrics.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    NewPhoto, ProgressMetrics, ProgressPhoto, ProgressSnapshot, UpsertCheckRequest, WeeklyCheck,
};
use crate::store::progress_metrics;
use crate::AppState;

/// GET /api/progress - Photos and weekly checks.
pub async fn get_progress(State(state): State<AppState>) -> ApiResult<ProgressSnapshot> {
    success(state.progress.snapshot(), state.namespace_key())
}

/// POST /api/progress/photos - Add a photo.
pub async fn add_photo(
    State(state): State<AppState>,
    Json(request): Json<NewPhoto>,
) -> ApiResult<ProgressPhoto> {
    let namespace = state.namespace_key();

    if request.uri.trim().is_empty() {
        return error(AppError::Validation("Uri is required".to_string()), namespace);
    }

    success(state.progress.add_photo(request), namespace)
}

/// DELETE /api/progress/photos/:id - Remove a photo.
pub async fn delete_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let namespace = state.namespace_key();

    if state.progress.remove_photo(&id) {
        success((), namespace)
    } else {
        error(
            AppError::NotFound(format!("Photo {} not found", id)),
            namespace,
        )
    }
}

/// PUT /api/progress/checks - Insert or replace a weekly check.
pub async fn upsert_check(
    State(state): State<AppState>,
    Json(request): Json<UpsertCheckRequest>,
) -> ApiResult<WeeklyCheck> {
    let week_of = request
        .week_of
        .unwrap_or_else(|| state.progress.current_week());

    let check = state.progress.upsert_check(week_of, request.answers);
    success(check, state.namespace_key())
}

/// GET /api/progress/metrics - Streak, today's completion and adherence.
pub async fn get_metrics(State(state): State<AppState>) -> ApiResult<ProgressMetrics> {
    let metrics = progress_metrics(&state.treatments, &state.progress);
    success(metrics, state.namespace_key())
}
