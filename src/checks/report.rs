//! Result types produced by a test run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::config::ServiceId;

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Ok,
    Fail,
    Timeout,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Timeout => "TIMEOUT",
        }
    }
}

/// Status of a whole report. TIMEOUT results collapse into FAIL here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallStatus {
    Ok,
    Fail,
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// One downstream probe outcome. Carries a payload on success, an error otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceCheckResult {
    service: ServiceId,
    check: String,
    status: CheckStatus,
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    latency: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ServiceCheckResult {
    pub fn ok(service: ServiceId, check: &str, latency: Duration, payload: Value) -> Self {
        Self {
            service,
            check: check.to_string(),
            status: CheckStatus::Ok,
            latency,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn fail(service: ServiceId, check: &str, latency: Duration, error: impl Into<String>) -> Self {
        Self {
            service,
            check: check.to_string(),
            status: CheckStatus::Fail,
            latency,
            payload: None,
            error: Some(error.into()),
        }
    }

    pub fn timeout(
        service: ServiceId,
        check: &str,
        latency: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            service,
            check: check.to_string(),
            status: CheckStatus::Timeout,
            latency,
            payload: None,
            error: Some(error.into()),
        }
    }

    pub fn service(&self) -> ServiceId {
        self.service
    }

    pub fn check(&self) -> &str {
        &self.check
    }

    pub fn status(&self) -> CheckStatus {
        self.status
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

/// Aggregate of every check in one run, in check-definition order.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    overall_status: OverallStatus,
    timestamp: DateTime<Utc>,
    message: String,
    summary: ReportSummary,
    results: Vec<ServiceCheckResult>,
}

impl TestReport {
    /// Build a report; the overall status is OK iff every result is OK.
    pub fn new(results: Vec<ServiceCheckResult>, timestamp: DateTime<Utc>) -> Self {
        let count = |status: CheckStatus| results.iter().filter(|r| r.status == status).count();
        let summary = ReportSummary {
            total: results.len(),
            passed: count(CheckStatus::Ok),
            failed: count(CheckStatus::Fail),
            timed_out: count(CheckStatus::Timeout),
        };

        let overall_status = if results.iter().all(ServiceCheckResult::is_ok) {
            OverallStatus::Ok
        } else {
            OverallStatus::Fail
        };

        Self {
            overall_status,
            timestamp,
            message: format!(
                "Tests completed: {}/{} successful",
                summary.passed, summary.total
            ),
            summary,
            results,
        }
    }

    pub fn overall_status(&self) -> OverallStatus {
        self.overall_status
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn summary(&self) -> ReportSummary {
        self.summary
    }

    pub fn results(&self) -> &[ServiceCheckResult] {
        &self.results
    }
}

/// Aggregate health as reported by `/api/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub service: ServiceId,
    /// "healthy" or "unhealthy"
    pub status: &'static str,
    pub latency_ms: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub status: HealthState,
    pub services: Vec<ServiceHealth>,
}

impl HealthSummary {
    pub fn from_results(results: &[ServiceCheckResult]) -> Self {
        let status = if !results.is_empty() && results.iter().all(ServiceCheckResult::is_ok) {
            HealthState::Ok
        } else {
            HealthState::Fail
        };

        let services = results
            .iter()
            .map(|r| ServiceHealth {
                name: r.check.clone(),
                service: r.service,
                status: if r.is_ok() { "healthy" } else { "unhealthy" },
                latency_ms: r.latency.as_millis() as u64,
                message: match (&r.error, &r.payload) {
                    (Some(error), _) => error.clone(),
                    (None, Some(payload)) => format!("{} service is running: {}", r.service, payload),
                    (None, None) => format!("{} service is running", r.service),
                },
            })
            .collect();

        Self { status, services }
    }
}
