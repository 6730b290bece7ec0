//! Treatment and today-checklist endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{parse_time_of_day, NewTreatment, TodayItem, Treatment, TreatmentSnapshot};
use crate::AppState;

/// GET /api/treatments - Treatments, today view and streak.
pub async fn list_treatments(State(state): State<AppState>) -> ApiResult<TreatmentSnapshot> {
    success(state.treatments.snapshot(), state.namespace_key())
}

/// POST /api/treatments - Add a treatment.
pub async fn create_treatment(
    State(state): State<AppState>,
    Json(request): Json<NewTreatment>,
) -> ApiResult<Treatment> {
    let namespace = state.namespace_key();

    if request.name.trim().is_empty() {
        return error(AppError::Validation("Name is required".to_string()), namespace);
    }
    if parse_time_of_day(&request.time).is_none() {
        return error(
            AppError::Validation(format!("Time must be HH:MM, got '{}'", request.time)),
            namespace,
        );
    }
    if let Some(dose) = &request.dose {
        if !(dose.amount.is_finite() && dose.amount > 0.0) {
            return error(
                AppError::Validation("Dose amount must be greater than zero".to_string()),
                namespace,
            );
        }
    }

    let treatment = state.treatments.add(request);
    success(treatment, namespace)
}

/// DELETE /api/treatments/:id - Remove a treatment.
pub async fn delete_treatment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let namespace = state.namespace_key();

    if state.treatments.remove(&id) {
        success((), namespace)
    } else {
        error(
            AppError::NotFound(format!("Treatment {} not found", id)),
            namespace,
        )
    }
}

/// POST /api/today/:id/toggle - Flip a today item.
pub async fn toggle_today(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TodayItem> {
    let namespace = state.namespace_key();

    match state.treatments.toggle_today(&id) {
        Some(item) => success(item, namespace),
        None => error(
            AppError::NotFound(format!("Today item {} not found", id)),
            namespace,
        ),
    }
}
