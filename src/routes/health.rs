//! Liveness endpoint for container orchestration.
//!
//! Returns 200 OK whenever the process can answer HTTP, independent of the
//! downstream services. Their health is reported by `/api/health`.

/// Liveness handler.
pub async fn health() -> &'static str {
    "ok"
}
