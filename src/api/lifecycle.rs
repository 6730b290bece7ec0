//! App lifecycle and data reset endpoints.

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::rollover::Lifecycle;
use crate::AppState;

/// Request body for POST /api/lifecycle.
#[derive(Debug, Deserialize)]
pub struct LifecycleRequest {
    pub state: Lifecycle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleResponse {
    pub state: Lifecycle,
    /// Date the today view now belongs to
    pub today: NaiveDate,
    pub rolled_over: bool,
}

/// POST /api/lifecycle - Report an app state transition.
pub async fn report_lifecycle(
    State(state): State<AppState>,
    Json(request): Json<LifecycleRequest>,
) -> ApiResult<LifecycleResponse> {
    let rolled_over = state.rollover.check();

    // No watcher listening is fine.
    let _ = state.lifecycle.send(request.state);

    success(
        LifecycleResponse {
            state: request.state,
            today: state.rollover.last_observed(),
            rolled_over,
        },
        state.namespace_key(),
    )
}

/// DELETE /api/data - Clear treatments and progress for the current namespace.
pub async fn clear_data(State(state): State<AppState>) -> ApiResult<()> {
    state.treatments.clear_all();
    state.progress.clear_all();
    success((), state.namespace_key())
}
