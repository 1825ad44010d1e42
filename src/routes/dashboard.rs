//! Dashboard page handler.

use axum::{
    extract::{Query, State},
    http::header::CACHE_CONTROL,
    response::{Html, IntoResponse, Response},
    Extension,
};
use serde::Deserialize;
use tracing::instrument;

use crate::config::CACHE_CONTROL_API;
use crate::error::{AppError, AppErrorResponse, ResultExt};
use crate::middleware::RequestId;
use crate::state::AppState;
use crate::templates::DASHBOARD_TEMPLATE;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Run every check and render the report server-side (no-JavaScript fallback).
    /// Accepts a bare `?run` as well as `true`/`1`/`yes`/`on`.
    #[serde(default)]
    pub run: Option<String>,
}

impl DashboardQuery {
    pub fn wants_run(&self) -> bool {
        match self.run.as_deref() {
            None => false,
            Some(value) => matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "" | "1" | "true" | "yes" | "on"
            ),
        }
    }
}

/// Render the dashboard listing the configured services and checks.
#[instrument(name = "dashboard::index", skip(state, request_id))]
pub async fn index(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<DashboardQuery>,
) -> Result<Response, AppErrorResponse> {
    let mut context = tera::Context::new();
    context.insert("config", &state.config.ui);
    context.insert("services", &state.config.services);
    context.insert("checks", state.aggregator.checks());

    let report = if query.wants_run() {
        Some(state.aggregator.run_all().await)
    } else {
        None
    };
    if let Some(report) = &report {
        context.insert("report", report);
    }

    let html = Html(
        state
            .tera
            .render(DASHBOARD_TEMPLATE, &context)
            .map_err(AppError::from)
            .with_request_id(&request_id)?,
    );

    // A rendered report belongs to this request only
    if report.is_some() {
        Ok(([(CACHE_CONTROL, CACHE_CONTROL_API)], html).into_response())
    } else {
        Ok(html.into_response())
    }
}
