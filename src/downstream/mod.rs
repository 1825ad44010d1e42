//! HTTP clients for the downstream services.
//!
//! One `reqwest::Client` is shared by both services. Each call is bounded by
//! the configured request timeout and is attempted exactly once; failures come
//! back as a typed `DownstreamError` for the caller to classify.

mod client;

use std::time::Duration;

pub use client::DownstreamClient;

use crate::config::{ConfigError, ServiceId, ServicesConfig};

/// Maximum number of bytes of an error body kept for diagnostics
pub const ERROR_BODY_LIMIT: usize = 512;

/// A failed downstream call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DownstreamError {
    #[error("{service} service is unreachable: {message}")]
    Connection { service: ServiceId, message: String },

    #[error("{service} service did not respond within {}ms", .after.as_millis())]
    Timeout { service: ServiceId, after: Duration },

    #[error("{service} service returned status {status}: {body}")]
    BadStatus {
        service: ServiceId,
        status: u16,
        body: String,
    },

    #[error("{service} service returned a malformed JSON body: {message}")]
    MalformedBody { service: ServiceId, message: String },

    #[error("Invalid path '{path}' for the {service} service: {message}")]
    InvalidPath {
        service: ServiceId,
        path: String,
        message: String,
    },
}

impl DownstreamError {
    pub fn service(&self) -> ServiceId {
        match self {
            DownstreamError::Connection { service, .. }
            | DownstreamError::Timeout { service, .. }
            | DownstreamError::BadStatus { service, .. }
            | DownstreamError::MalformedBody { service, .. }
            | DownstreamError::InvalidPath { service, .. } => *service,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DownstreamError::Timeout { .. })
    }
}

/// Clients for both downstream services, built once from configuration.
#[derive(Clone)]
pub struct Downstream {
    users: DownstreamClient,
    analytics: DownstreamClient,
}

impl Downstream {
    /// Build both clients. Fails if a base URL is missing or invalid, or the
    /// HTTP client cannot be constructed.
    pub fn new(config: &ServicesConfig) -> Result<Self, ConfigError> {
        let request_timeout = config.request_timeout();

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Validation(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            users: DownstreamClient::new(
                ServiceId::Users,
                config.base_url(ServiceId::Users)?,
                http.clone(),
                request_timeout,
            ),
            analytics: DownstreamClient::new(
                ServiceId::Analytics,
                config.base_url(ServiceId::Analytics)?,
                http,
                request_timeout,
            ),
        })
    }

    pub fn client(&self, service: ServiceId) -> &DownstreamClient {
        match service {
            ServiceId::Users => &self.users,
            ServiceId::Analytics => &self.analytics,
        }
    }
}

/// Truncate a diagnostic body on a char boundary.
pub(crate) fn truncate_body(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut end = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}
