use std::time::Duration;

use axum::body::Bytes;
use reqwest::Url;
use serde_json::Value;
use tokio::time::timeout;
use tracing::instrument;

use super::{truncate_body, DownstreamError};
use crate::config::{CheckMethod, ServiceId};

/// Client for a single downstream service.
///
/// Cheap to clone: the underlying `reqwest::Client` is reference counted.
#[derive(Clone)]
pub struct DownstreamClient {
    service: ServiceId,
    base_url: Url,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl DownstreamClient {
    pub fn new(
        service: ServiceId,
        base_url: Url,
        http: reqwest::Client,
        request_timeout: Duration,
    ) -> Self {
        Self {
            service,
            base_url,
            http,
            request_timeout,
        }
    }

    pub fn service(&self) -> ServiceId {
        self.service
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL, keeping any path prefix the base carries.
    fn endpoint(&self, path: &str) -> Result<Url, DownstreamError> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| DownstreamError::InvalidPath {
            service: self.service,
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Issue a request and decode the JSON body.
    #[instrument(
        name = "downstream.send",
        skip(self, body),
        fields(service = %self.service, status)
    )]
    pub async fn send(
        &self,
        method: CheckMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, DownstreamError> {
        let bytes = self.fetch(method, path, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| DownstreamError::MalformedBody {
            service: self.service,
            message: e.to_string(),
        })
    }

    /// GET `path` and return the body bytes untouched, after confirming they are JSON.
    #[instrument(name = "downstream.passthrough", skip(self), fields(service = %self.service, status))]
    pub async fn get_passthrough(&self, path: &str) -> Result<Bytes, DownstreamError> {
        let bytes = self.fetch(CheckMethod::Get, path, None).await?;
        serde_json::from_slice::<serde::de::IgnoredAny>(&bytes).map_err(|e| {
            DownstreamError::MalformedBody {
                service: self.service,
                message: e.to_string(),
            }
        })?;
        Ok(bytes)
    }

    /// One bounded attempt: send, require a 2xx status, read the body.
    async fn fetch(
        &self,
        method: CheckMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Bytes, DownstreamError> {
        let url = self.endpoint(path)?;

        let mut request = match method {
            CheckMethod::Get => self.http.get(url),
            CheckMethod::Post => self.http.post(url),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request.send().await.map_err(|e| self.classify(e))?;
            let status = response.status();
            tracing::Span::current().record("status", status.as_u16());

            if !status.is_success() {
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
                return Err(DownstreamError::BadStatus {
                    service: self.service,
                    status: status.as_u16(),
                    body: truncate_body(text),
                });
            }

            let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
            Ok::<_, DownstreamError>(bytes)
        };

        match timeout(self.request_timeout, exchange).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => {
                tracing::warn!(service = %self.service, %path, error = %e, "Downstream call failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(
                    service = %self.service,
                    %path,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Downstream call timed out"
                );
                Err(self.timed_out())
            }
        }
    }

    fn timed_out(&self) -> DownstreamError {
        DownstreamError::Timeout {
            service: self.service,
            after: self.request_timeout,
        }
    }

    fn classify(&self, err: reqwest::Error) -> DownstreamError {
        if err.is_timeout() {
            self.timed_out()
        } else {
            DownstreamError::Connection {
                service: self.service,
                message: err.to_string(),
            }
        }
    }
}
