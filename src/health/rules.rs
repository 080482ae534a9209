use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Quantity a health rule compares against its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthMetric {
    CpuPercent,
    MemoryPercent,
    DiskPercent,
    ErrorRatePercent,
    AvgResponseSeconds,
    P95ResponseSeconds,
    P99ResponseSeconds,
}

impl HealthMetric {
    pub fn label(self) -> &'static str {
        match self {
            HealthMetric::CpuPercent => "CPU",
            HealthMetric::MemoryPercent => "memory",
            HealthMetric::DiskPercent => "disk",
            HealthMetric::ErrorRatePercent => "error rate",
            HealthMetric::AvgResponseSeconds => "average response time",
            HealthMetric::P95ResponseSeconds => "p95 response time",
            HealthMetric::P99ResponseSeconds => "p99 response time",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            HealthMetric::AvgResponseSeconds
            | HealthMetric::P95ResponseSeconds
            | HealthMetric::P99ResponseSeconds => "s",
            HealthMetric::CpuPercent
            | HealthMetric::MemoryPercent
            | HealthMetric::DiskPercent
            | HealthMetric::ErrorRatePercent => "%",
        }
    }
}

/// One row of the threshold table.
///
/// A value strictly above `critical` forces `unhealthy`; strictly above
/// `warning` forces at least `degraded`. Either bound may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthRule {
    pub issue: String,
    pub metric: HealthMetric,
    #[serde(default)]
    pub warning: Option<f64>,
    #[serde(default)]
    pub critical: Option<f64>,
}

impl HealthRule {
    pub fn new(
        issue: impl Into<String>,
        metric: HealthMetric,
        warning: Option<f64>,
        critical: Option<f64>,
    ) -> Self {
        Self {
            issue: issue.into(),
            metric,
            warning,
            critical,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.issue.trim().is_empty() {
            return Err(MonitorError::InvalidConfig(
                "health rule issue must not be empty".into(),
            ));
        }
        if self.warning.is_none() && self.critical.is_none() {
            return Err(MonitorError::InvalidConfig(format!(
                "health rule {:?} needs a warning or critical threshold",
                self.issue
            )));
        }
        for bound in [self.warning, self.critical].into_iter().flatten() {
            if !bound.is_finite() || bound < 0.0 {
                return Err(MonitorError::InvalidConfig(format!(
                    "health rule {:?} has invalid threshold {bound}",
                    self.issue
                )));
            }
        }
        if let (Some(w), Some(c)) = (self.warning, self.critical) {
            if w > c {
                return Err(MonitorError::InvalidConfig(format!(
                    "health rule {:?}: warning {w} is above critical {c}",
                    self.issue
                )));
            }
        }
        Ok(())
    }
}

/// Which error rate feeds `error_rate_percent` rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorRateScope {
    /// All requests across all endpoints.
    #[default]
    Global,
    /// The single endpoint with the highest error rate.
    WorstEndpoint,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(default)]
    pub error_rate_scope: ErrorRateScope,

    /// Request-derived rules stay silent until this many requests were seen.
    #[serde(default)]
    pub min_requests_for_error_rate: u64,

    #[serde(default = "default_rules")]
    pub rules: Vec<HealthRule>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            error_rate_scope: ErrorRateScope::default(),
            min_requests_for_error_rate: 0,
            rules: default_rules(),
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<()> {
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }
}

/// CPU and memory go critical above 90% and warn above 80%; error rate and
/// average latency only degrade.
pub fn default_rules() -> Vec<HealthRule> {
    vec![
        HealthRule::new("high_cpu", HealthMetric::CpuPercent, Some(80.0), Some(90.0)),
        HealthRule::new("high_memory", HealthMetric::MemoryPercent, Some(80.0), Some(90.0)),
        HealthRule::new("high_error_rate", HealthMetric::ErrorRatePercent, Some(10.0), None),
        HealthRule::new("slow_response", HealthMetric::AvgResponseSeconds, Some(5.0), None),
    ]
}
