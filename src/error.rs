use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::downstream::DownstreamError;
use crate::middleware::RequestId;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Downstream(#[from] DownstreamError),

    #[error("Template rendering error: {0}")]
    Template(#[from] tera::Error),
}

impl AppError {
    /// Status code and client-facing message. Internal details are never exposed.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Downstream(e) if e.is_timeout() => (StatusCode::GATEWAY_TIMEOUT, e.to_string()),
            AppError::Downstream(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Template(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }

    fn log(&self, request_id: Option<&Uuid>) {
        let request_id = request_id.map(|id| id.to_string()).unwrap_or_default();
        match self {
            AppError::Downstream(e) => {
                tracing::warn!(%request_id, service = %e.service(), error = %e, "Downstream request failed");
            }
            AppError::Template(_) => {
                tracing::error!(%request_id, error = ?self, "Internal error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        AppErrorResponse {
            error: self,
            request_id: None,
        }
        .into_response()
    }
}

/// An `AppError` tagged with the ID of the request that produced it.
#[derive(Debug)]
pub struct AppErrorResponse {
    pub error: AppError,
    pub request_id: Option<Uuid>,
}

impl IntoResponse for AppErrorResponse {
    fn into_response(self) -> Response {
        self.error.log(self.request_id.as_ref());
        let (status, message) = self.error.status_and_message();

        let body = match self.request_id {
            Some(id) => json!({ "error": message, "request_id": id.to_string() }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Attach a request ID to any error convertible into `AppError`.
pub trait ResultExt<T> {
    fn with_request_id(self, request_id: &RequestId) -> Result<T, AppErrorResponse>;
}

impl<T, E: Into<AppError>> ResultExt<T> for Result<T, E> {
    fn with_request_id(self, request_id: &RequestId) -> Result<T, AppErrorResponse> {
        self.map_err(|e| AppErrorResponse {
            error: e.into(),
            request_id: Some(request_id.0),
        })
    }
}
