//! Test aggregator: runs the configured checks against the downstream services
//! and folds their outcomes into a single report.
//!
//! Every check runs as its own task and is independent of the others; a failed
//! check never prevents later checks from running. Results are collected in
//! check-definition order regardless of completion order. An optional run-wide
//! timeout abandons checks still in flight and records them as TIMEOUT.

mod report;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tracing::Instrument;

pub use report::{
    CheckStatus, HealthState, HealthSummary, OverallStatus, ReportSummary, ServiceCheckResult,
    ServiceHealth, TestReport,
};

use crate::config::{CheckConfig, ServiceId, HEALTH_PATH};
use crate::downstream::{Downstream, DownstreamClient, DownstreamError};

/// Runs checks against the downstream services. Cloned into each request.
#[derive(Clone)]
pub struct TestAggregator {
    downstream: Arc<Downstream>,
    checks: Arc<[CheckConfig]>,
    health_checks: Arc<[CheckConfig]>,
    run_timeout: Option<Duration>,
}

impl TestAggregator {
    pub fn new(downstream: Arc<Downstream>, checks: Vec<CheckConfig>, run_timeout: Option<Duration>) -> Self {
        let mut health_checks: Vec<CheckConfig> =
            checks.iter().filter(|c| c.is_health_probe()).cloned().collect();
        if health_checks.is_empty() {
            health_checks = ServiceId::ALL
                .iter()
                .map(|service| CheckConfig::get(&format!("{}-health", service), *service, HEALTH_PATH))
                .collect();
        }

        Self {
            downstream,
            checks: checks.into(),
            health_checks: health_checks.into(),
            run_timeout,
        }
    }

    pub fn checks(&self) -> &[CheckConfig] {
        &self.checks
    }

    pub fn health_checks(&self) -> &[CheckConfig] {
        &self.health_checks
    }

    /// Run every configured check and build the report.
    pub async fn run_all(&self) -> TestReport {
        let results = self.run_checks(&self.checks).await;
        let report = TestReport::new(results, Utc::now());
        let summary = report.summary();
        tracing::info!(
            overall = ?report.overall_status(),
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            timed_out = summary.timed_out,
            "Test run completed"
        );
        report
    }

    /// Run only the health probes.
    pub async fn run_health(&self) -> HealthSummary {
        let results = self.run_checks(&self.health_checks).await;
        HealthSummary::from_results(&results)
    }

    /// Spawn one task per check and join them in definition order.
    async fn run_checks(&self, checks: &[CheckConfig]) -> Vec<ServiceCheckResult> {
        // A bound too large to represent as an instant means no deadline
        let deadline = self.run_timeout.and_then(|bound| {
            tokio::time::Instant::now()
                .checked_add(bound)
                .map(|deadline| (deadline, bound))
        });

        let handles: Vec<_> = checks
            .iter()
            .map(|check| {
                let client = self.downstream.client(check.service).clone();
                let check = check.clone();
                let span = tracing::info_span!("check", check = %check.name, service = %check.service);
                tokio::spawn(async move { run_check(&client, &check).await }.instrument(span))
            })
            .collect();

        let mut results = Vec::with_capacity(checks.len());
        for (check, mut handle) in checks.iter().zip(handles) {
            let joined = match deadline {
                Some((deadline, bound)) => {
                    match tokio::time::timeout_at(deadline, &mut handle).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            handle.abort();
                            tracing::warn!(check = %check.name, "Run timeout elapsed, abandoning check");
                            results.push(ServiceCheckResult::timeout(
                                check.service,
                                &check.name,
                                bound,
                                format!(
                                    "run timeout of {}ms elapsed before the check completed",
                                    bound.as_millis()
                                ),
                            ));
                            continue;
                        }
                    }
                }
                None => handle.await,
            };

            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(check = %check.name, error = %e, "Check task failed");
                    results.push(ServiceCheckResult::fail(
                        check.service,
                        &check.name,
                        Duration::ZERO,
                        format!("check task failed: {}", e),
                    ));
                }
            }
        }

        results
    }
}

/// Run one check and classify the outcome.
pub async fn run_check(client: &DownstreamClient, check: &CheckConfig) -> ServiceCheckResult {
    let start = Instant::now();
    let outcome = client.send(check.method, &check.path, check.body.as_ref()).await;
    let result = classify(check, outcome, start.elapsed());

    match result.status() {
        CheckStatus::Ok => tracing::debug!(latency_ms = result.latency().as_millis() as u64, "Check passed"),
        status => tracing::warn!(
            status = status.as_str(),
            error = result.error().unwrap_or_default(),
            "Check did not pass"
        ),
    }
    result
}

fn classify(
    check: &CheckConfig,
    outcome: Result<Value, DownstreamError>,
    latency: Duration,
) -> ServiceCheckResult {
    match outcome {
        Ok(payload) => match check.expect_field.as_deref() {
            Some(field) if !has_top_level_field(&payload, field) => ServiceCheckResult::fail(
                check.service,
                &check.name,
                latency,
                format!("response is missing expected field '{}'", field),
            ),
            _ => ServiceCheckResult::ok(check.service, &check.name, latency, payload),
        },
        Err(e) => match &e {
            // Latency of a timed-out call is the bound itself
            DownstreamError::Timeout { after, .. } => {
                ServiceCheckResult::timeout(check.service, &check.name, *after, e.to_string())
            }
            _ => ServiceCheckResult::fail(check.service, &check.name, latency, e.to_string()),
        },
    }
}

fn has_top_level_field(payload: &Value, field: &str) -> bool {
    payload
        .as_object()
        .map(|object| object.contains_key(field))
        .unwrap_or(false)
}
