//! Switchyard: a test dashboard for a users service and an analytics service.
//!
//! Runs a configured list of health and data checks against both services,
//! reports each outcome with its latency, and proxies selected endpoints
//! through to the browser.

pub mod checks;
pub mod config;
pub mod downstream;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod templates;

pub use error::{AppError, AppErrorResponse};
pub use routes::create_router;
pub use state::AppState;
