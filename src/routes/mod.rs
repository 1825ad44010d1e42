//! HTTP route handlers.
//!
//! The dashboard page and static assets are cacheable; every `/api` route
//! reflects live downstream state and is marked `no-store`.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request, allowing correlation of all logs within a request.

pub mod api;
pub mod dashboard;
pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::{CACHE_CONTROL_API, CACHE_CONTROL_DASHBOARD, CACHE_CONTROL_STATIC};
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Creates the Axum router with all routes and cache headers.
pub fn create_router(state: AppState) -> Router {
    let dashboard_routes = Router::new()
        .route("/", get(dashboard::index))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_DASHBOARD),
        ));

    let api_routes = Router::new()
        .route("/api/run-tests", post(api::run_tests))
        .route("/api/health", get(api::health))
        .route("/api/users", get(api::users))
        .route("/api/analytics", get(api::analytics))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_API),
        ));

    let static_routes = Router::new()
        .nest_service("/static", ServeDir::new(&state.config.ui.static_dir))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_STATIC),
        ));

    // Liveness - no caching, always fresh
    let health_routes = Router::new().route("/healthz", get(health::health));

    Router::new()
        .merge(dashboard_routes)
        .merge(api_routes)
        .merge(health_routes)
        .merge(static_routes)
        .with_state(state)
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
