//! Health verdict from the current aggregates and host snapshot.

pub mod rules;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::collector::format_uptime;
use crate::metrics::AggregateSnapshot;
use crate::system::SystemSnapshot;

pub use rules::{default_rules, ErrorRateScope, HealthConfig, HealthMetric, HealthRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthVerdict {
    pub status: HealthStatus,
    /// Issue codes of every rule that fired, in table order
    pub issues: Vec<String>,
    /// One readable sentence per entry in `issues`
    pub details: Vec<String>,
    pub uptime: String,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Warning,
    Critical,
}

impl Severity {
    fn status(self) -> HealthStatus {
        match self {
            Severity::Warning => HealthStatus::Degraded,
            Severity::Critical => HealthStatus::Unhealthy,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// Applies the configured threshold table.
#[derive(Debug, Clone)]
pub struct HealthEvaluator {
    config: HealthConfig,
}

impl HealthEvaluator {
    pub fn new(config: HealthConfig) -> Self {
        Self { config }
    }

    /// Pure function of its inputs; never touches shared state.
    pub fn evaluate(
        &self,
        aggregate: &AggregateSnapshot,
        system: Option<&SystemSnapshot>,
        uptime: Duration,
        total_requests: u64,
        now: DateTime<Utc>,
    ) -> HealthVerdict {
        let mut status = HealthStatus::Healthy;
        let mut issues = Vec::new();
        let mut details = Vec::new();

        for rule in &self.config.rules {
            let Some(value) = self.observe(rule.metric, aggregate, system) else {
                continue;
            };
            let Some((severity, threshold)) = breach(rule, value) else {
                continue;
            };

            status = status.max(severity.status());
            issues.push(rule.issue.clone());
            details.push(format!(
                "High {}: {value:.1}{unit} (> {threshold}{unit})",
                rule.metric.label(),
                unit = rule.metric.unit(),
            ));
            tracing::debug!(
                issue = %rule.issue,
                severity = severity.as_str(),
                value,
                "health rule fired"
            );
        }

        HealthVerdict {
            status,
            issues,
            details,
            uptime: format_uptime(uptime),
            uptime_seconds: uptime.as_secs(),
            total_requests,
            timestamp: now,
        }
    }

    /// `None` means the rule has nothing to look at yet.
    fn observe(
        &self,
        metric: HealthMetric,
        aggregate: &AggregateSnapshot,
        system: Option<&SystemSnapshot>,
    ) -> Option<f64> {
        let enough_traffic =
            aggregate.total_calls >= self.config.min_requests_for_error_rate;
        let from_traffic = |v: f64| enough_traffic.then_some(v);

        match metric {
            HealthMetric::CpuPercent => system.map(|s| s.cpu_percent),
            HealthMetric::MemoryPercent => system.map(|s| s.memory_percent),
            HealthMetric::DiskPercent => system.map(|s| s.disk_usage_percent),
            HealthMetric::ErrorRatePercent => from_traffic(match self.config.error_rate_scope {
                ErrorRateScope::Global => aggregate.error_rate_percent,
                ErrorRateScope::WorstEndpoint => aggregate.worst_endpoint_error_rate(),
            }),
            HealthMetric::AvgResponseSeconds => from_traffic(aggregate.avg_response_time),
            HealthMetric::P95ResponseSeconds => from_traffic(aggregate.latency.p95_ms / 1000.0),
            HealthMetric::P99ResponseSeconds => from_traffic(aggregate.latency.p99_ms / 1000.0),
        }
    }
}

impl Default for HealthEvaluator {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

/// Critical is checked first so each rule contributes at most one issue.
fn breach(rule: &HealthRule, value: f64) -> Option<(Severity, f64)> {
    if let Some(c) = rule.critical.filter(|c| value > *c) {
        return Some((Severity::Critical, c));
    }
    rule.warning
        .filter(|w| value > *w)
        .map(|w| (Severity::Warning, w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Endpoint, EndpointAggregator, RequestRecord};

    fn system(cpu: f64, memory: f64) -> SystemSnapshot {
        SystemSnapshot {
            cpu_percent: cpu,
            memory_percent: memory,
            memory_used_mb: 1024.0,
            memory_available_mb: 1024.0,
            disk_usage_percent: 50.0,
            timestamp: Utc::now(),
        }
    }

    /// `calls` requests to one endpoint, the first `errors` of them failing.
    fn traffic(path: &str, calls: u64, errors: u64, secs: f64, agg: &mut EndpointAggregator) {
        for i in 0..calls {
            let status = if i < errors { 500 } else { 200 };
            agg.update(&RequestRecord::new(Endpoint::new("GET", path), status, secs));
        }
    }

    fn nominal() -> AggregateSnapshot {
        let mut agg = EndpointAggregator::new();
        traffic("/api/test", 20, 0, 0.1, &mut agg);
        agg.snapshot()
    }

    fn eval(
        evaluator: &HealthEvaluator,
        agg: &AggregateSnapshot,
        sys: Option<&SystemSnapshot>,
    ) -> HealthVerdict {
        evaluator.evaluate(agg, sys, Duration::from_secs(65), agg.total_calls, Utc::now())
    }

    #[test]
    fn critical_cpu_is_unhealthy() {
        let v = eval(&HealthEvaluator::default(), &nominal(), Some(&system(95.0, 50.0)));
        assert_eq!(v.status, HealthStatus::Unhealthy);
        assert_eq!(v.issues, vec!["high_cpu"]);
        assert_eq!(v.details, vec!["High CPU: 95.0% (> 90%)"]);
        assert_eq!(v.uptime, "0:01:05");
    }

    #[test]
    fn warning_cpu_is_degraded() {
        let v = eval(&HealthEvaluator::default(), &nominal(), Some(&system(85.0, 50.0)));
        assert_eq!(v.status, HealthStatus::Degraded);
        assert_eq!(v.issues, vec!["high_cpu"]);
    }

    #[test]
    fn nominal_is_healthy() {
        let v = eval(&HealthEvaluator::default(), &nominal(), Some(&system(20.0, 30.0)));
        assert_eq!(v.status, HealthStatus::Healthy);
        assert!(v.issues.is_empty());
        assert!(v.details.is_empty());
    }

    #[test]
    fn every_fired_rule_is_listed_in_table_order() {
        let mut agg = EndpointAggregator::new();
        traffic("/slow", 10, 5, 6.0, &mut agg);
        let v = eval(&HealthEvaluator::default(), &agg.snapshot(), Some(&system(85.0, 92.0)));

        assert_eq!(v.status, HealthStatus::Unhealthy);
        assert_eq!(
            v.issues,
            vec!["high_cpu", "high_memory", "high_error_rate", "slow_response"]
        );
    }

    #[test]
    fn error_rate_alone_only_degrades() {
        let mut agg = EndpointAggregator::new();
        traffic("/api/test", 10, 9, 0.1, &mut agg);
        let v = eval(&HealthEvaluator::default(), &agg.snapshot(), None);
        assert_eq!(v.status, HealthStatus::Degraded);
        assert_eq!(v.issues, vec!["high_error_rate"]);
        assert_eq!(v.details, vec!["High error rate: 90.0% (> 10%)"]);
    }

    #[test]
    fn thresholds_are_strict() {
        let v = eval(&HealthEvaluator::default(), &nominal(), Some(&system(80.0, 90.0)));
        assert_eq!(v.status, HealthStatus::Degraded);
        assert_eq!(v.issues, vec!["high_memory"]);
    }

    #[test]
    fn host_rules_skipped_without_snapshot() {
        let v = eval(&HealthEvaluator::default(), &EndpointAggregator::new().snapshot(), None);
        assert_eq!(v.status, HealthStatus::Healthy);
        assert_eq!(v.total_requests, 0);
    }

    #[test]
    fn worst_endpoint_scope() {
        let mut agg = EndpointAggregator::new();
        traffic("/busy", 95, 0, 0.1, &mut agg);
        traffic("/flaky", 5, 3, 0.1, &mut agg);
        let snap = agg.snapshot();

        let global = eval(&HealthEvaluator::default(), &snap, None);
        assert!(global.issues.is_empty());

        let per_endpoint = HealthEvaluator::new(HealthConfig {
            error_rate_scope: ErrorRateScope::WorstEndpoint,
            ..HealthConfig::default()
        });
        assert_eq!(eval(&per_endpoint, &snap, None).issues, vec!["high_error_rate"]);
    }

    #[test]
    fn min_requests_gates_request_rules() {
        let mut agg = EndpointAggregator::new();
        traffic("/api/test", 2, 2, 0.1, &mut agg);
        let gated = HealthEvaluator::new(HealthConfig {
            min_requests_for_error_rate: 10,
            ..HealthConfig::default()
        });
        assert_eq!(eval(&gated, &agg.snapshot(), None).status, HealthStatus::Healthy);
    }

    #[test]
    fn custom_table_with_percentile_and_disk() {
        let mut agg = EndpointAggregator::new();
        traffic("/api/test", 100, 0, 3.0, &mut agg);
        let evaluator = HealthEvaluator::new(HealthConfig {
            rules: vec![
                HealthRule::new("slow_tail", HealthMetric::P95ResponseSeconds, Some(2.0), None),
                HealthRule::new("disk_full", HealthMetric::DiskPercent, None, Some(40.0)),
            ],
            ..HealthConfig::default()
        });

        let v = eval(&evaluator, &agg.snapshot(), Some(&system(10.0, 10.0)));
        assert_eq!(v.status, HealthStatus::Unhealthy);
        assert_eq!(v.issues, vec!["slow_tail", "disk_full"]);
        assert_eq!(v.details[1], "High disk: 50.0% (> 40%)");
    }

    #[test]
    fn p99_rule_reads_tail_latency_in_seconds() {
        let mut agg = EndpointAggregator::new();
        traffic("/api/test", 98, 0, 0.05, &mut agg);
        traffic("/api/report", 2, 0, 4.0, &mut agg);
        let evaluator = HealthEvaluator::new(HealthConfig {
            rules: vec![HealthRule::new(
                "slow_p99",
                HealthMetric::P99ResponseSeconds,
                Some(1.0),
                Some(3.5),
            )],
            ..HealthConfig::default()
        });

        let v = eval(&evaluator, &agg.snapshot(), None);
        assert_eq!(v.status, HealthStatus::Unhealthy);
        assert_eq!(v.issues, vec!["slow_p99"]);
        assert!(v.details[0].starts_with("High p99 response time: 4.0s (> 3.5s)"));
    }
}
