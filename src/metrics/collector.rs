use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::aggregator::round_to;
use super::{
    AggregateSnapshot, Endpoint, EndpointAggregator, EndpointStats, Ledger, PercentileSet,
    RequestRecord,
};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::health::{HealthEvaluator, HealthVerdict};
use crate::system::SystemSnapshot;

/// Host usage above this is logged at warn level as snapshots arrive.
const HIGH_USAGE_PERCENT: f64 = 80.0;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe monitoring core.
/// The middleware calls `on_request_completed()`, the sampler calls
/// `record_system()`, query routes call `stats()` / `health()`.
pub struct MetricsCollector {
    inner: Mutex<Inner>,
    system: RwLock<VecDeque<SystemSnapshot>>,
    system_history: usize,
    evaluator: HealthEvaluator,
    recent_window: Duration,
    slow_request_seconds: f64,
    started: Instant,
}

/// Complete read-only snapshot returned by the stats query.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_seconds: u64,
    pub uptime_human: String,
    /// Lifetime count, unaffected by ledger eviction or the recent window
    pub total_requests: u64,
    pub recent_requests: u64,
    pub recent_window_seconds: u64,
    pub error_rate_percent: f64,
    pub avg_response_time_ms: f64,
    pub latency_ms: PercentileSet,
    pub ledger_size: usize,
    pub current_system: Option<SystemSnapshot>,
    pub endpoints: BTreeMap<String, EndpointStats>,
    pub timestamp: DateTime<Utc>,
}

// ─── Internal state ──────────────────────────────────────────────

/// Ledger and aggregator change together under one lock, so readers never
/// see a record in one and not the other.
struct Inner {
    ledger: Ledger,
    aggregator: EndpointAggregator,
}

// ─── MetricsCollector impl ───────────────────────────────────────

impl MetricsCollector {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ledger: Ledger::new(config.max_requests),
                aggregator: EndpointAggregator::new(),
            }),
            system: RwLock::new(VecDeque::with_capacity(config.system_history)),
            system_history: config.system_history.max(1),
            evaluator: HealthEvaluator::new(config.health.clone()),
            recent_window: config.recent_window(),
            slow_request_seconds: config.slow_request_seconds,
            started: Instant::now(),
        }
    }

    /// Entry point for the request path. Never fails: malformed input is
    /// logged and dropped without touching any counter.
    #[allow(clippy::too_many_arguments)]
    pub fn on_request_completed(
        &self,
        method: &str,
        path: &str,
        status_code: u16,
        duration_seconds: f64,
        client_addr: Option<&str>,
        user_agent: Option<&str>,
        error_message: Option<&str>,
    ) {
        let mut record =
            RequestRecord::new(Endpoint::new(method, path), status_code, duration_seconds);
        record.client_addr = client_addr.map(str::to_owned);
        record.user_agent = user_agent.map(str::to_owned);
        record.error_message = error_message.filter(|m| !m.is_empty()).map(str::to_owned);

        if let Err(e) = self.record(record) {
            tracing::warn!(%method, %path, error = %e, "request observation dropped");
        }
    }

    /// Validate and store a caller-built record.
    pub fn record(&self, record: RequestRecord) -> Result<()> {
        record.validate()?;
        self.log_request(&record);

        let mut inner = self.inner.lock();
        inner.aggregator.update(&record);
        inner.ledger.record(record);
        Ok(())
    }

    /// Publish a host snapshot; the oldest one falls off past `system_history`.
    pub fn record_system(&self, snapshot: SystemSnapshot) {
        if snapshot.cpu_percent > HIGH_USAGE_PERCENT {
            tracing::warn!(cpu = snapshot.cpu_percent, "high CPU usage");
        }
        if snapshot.memory_percent > HIGH_USAGE_PERCENT {
            tracing::warn!(memory = snapshot.memory_percent, "high memory usage");
        }

        let mut history = self.system.write();
        if history.len() == self.system_history {
            history.pop_front();
        }
        history.push_back(snapshot);
    }

    pub fn latest_system(&self) -> Option<SystemSnapshot> {
        self.system.read().back().cloned()
    }

    /// Trailing host snapshots, oldest first.
    pub fn system_history(&self) -> Vec<SystemSnapshot> {
        self.system.read().iter().cloned().collect()
    }

    pub fn total_requests(&self) -> u64 {
        self.inner.lock().ledger.total_ever_recorded()
    }

    /// Copies of ledger records stamped at or after `since`.
    pub fn recent_records(&self, since: DateTime<Utc>) -> Vec<RequestRecord> {
        self.inner.lock().ledger.recent_since(since).cloned().collect()
    }

    pub fn endpoint_stats(&self) -> AggregateSnapshot {
        self.inner.lock().aggregator.snapshot()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Produce a read-only snapshot for the stats query.
    pub fn stats(&self) -> StatsSnapshot {
        let now = Utc::now();
        let since = now - chrono::Duration::from_std(self.recent_window)
            .unwrap_or_else(|_| chrono::Duration::zero());

        let (aggregate, total_requests, recent_requests, ledger_size) = {
            let inner = self.inner.lock();
            (
                inner.aggregator.snapshot(),
                inner.ledger.total_ever_recorded(),
                inner.ledger.recent_since(since).count() as u64,
                inner.ledger.len(),
            )
        };
        let uptime = self.uptime();

        StatsSnapshot {
            uptime_seconds: uptime.as_secs(),
            uptime_human: format_uptime(uptime),
            total_requests,
            recent_requests,
            recent_window_seconds: self.recent_window.as_secs(),
            error_rate_percent: round_to(aggregate.error_rate_percent, 2),
            avg_response_time_ms: round_to(aggregate.avg_response_time * 1000.0, 2),
            latency_ms: aggregate.latency,
            ledger_size,
            current_system: self.latest_system(),
            endpoints: aggregate
                .endpoints
                .iter()
                .map(|(k, v)| (k.clone(), v.rounded()))
                .collect(),
            timestamp: now,
        }
    }

    /// Evaluate the health table against the current state.
    pub fn health(&self) -> HealthVerdict {
        let (aggregate, total_requests) = {
            let inner = self.inner.lock();
            (inner.aggregator.snapshot(), inner.ledger.total_ever_recorded())
        };
        let system = self.latest_system();

        self.evaluator.evaluate(
            &aggregate,
            system.as_ref(),
            self.uptime(),
            total_requests,
            Utc::now(),
        )
    }

    fn log_request(&self, r: &RequestRecord) {
        let endpoint = &r.endpoint;
        let status = r.status_code;
        let secs = r.duration_seconds;
        if status >= 500 {
            tracing::error!(
                %endpoint,
                status,
                duration_secs = secs,
                error = r.error_message.as_deref().unwrap_or(""),
                "server error"
            );
        } else if status >= 400 {
            tracing::warn!(%endpoint, status, duration_secs = secs, "client error");
        } else if secs > self.slow_request_seconds {
            tracing::warn!(%endpoint, status, duration_secs = secs, "slow request");
        } else {
            tracing::debug!(%endpoint, status, duration_secs = secs, "request");
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}

/// `H:MM:SS`, prefixed with `N day(s), ` once past a day.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let h = (secs % 86_400) / 3_600;
    let m = (secs % 3_600) / 60;
    let s = secs % 60;

    match days {
        0 => format!("{h}:{m:02}:{s:02}"),
        1 => format!("1 day, {h}:{m:02}:{s:02}"),
        _ => format!("{days} days, {h}:{m:02}:{s:02}"),
    }
}
