//! JSON API handlers.
//!
//! Downstream failures during a test run are reported as data inside the
//! report, never as HTTP errors. Only the passthrough endpoints turn a
//! downstream failure into a non-2xx status.

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use tracing::instrument;

use crate::checks::{HealthSummary, TestReport};
use crate::config::ServiceId;
use crate::error::{AppErrorResponse, ResultExt};
use crate::middleware::RequestId;
use crate::state::AppState;

/// Path of the users listing on the users service
pub const USERS_PATH: &str = "/users";

/// Path of the analytics summary on the analytics service
pub const ANALYTICS_PATH: &str = "/analytics";

/// Run every configured check and return the report.
#[instrument(name = "api::run_tests", skip(state))]
pub async fn run_tests(State(state): State<AppState>) -> Json<TestReport> {
    Json(state.aggregator.run_all().await)
}

/// Probe the health endpoint of each downstream service.
#[instrument(name = "api::health", skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthSummary> {
    Json(state.aggregator.run_health().await)
}

/// Forward the users service's user list verbatim.
#[instrument(name = "api::users", skip(state, request_id))]
pub async fn users(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Response, AppErrorResponse> {
    passthrough(&state, ServiceId::Users, USERS_PATH, &request_id).await
}

/// Forward the analytics service's analytics verbatim.
#[instrument(name = "api::analytics", skip(state, request_id))]
pub async fn analytics(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Response, AppErrorResponse> {
    passthrough(&state, ServiceId::Analytics, ANALYTICS_PATH, &request_id).await
}

async fn passthrough(
    state: &AppState,
    service: ServiceId,
    path: &str,
    request_id: &RequestId,
) -> Result<Response, AppErrorResponse> {
    let body: Bytes = state
        .downstream
        .client(service)
        .get_passthrough(path)
        .await
        .with_request_id(request_id)?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
