use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::Serialize;

use super::percentiles::PercentileSet;
use super::RequestRecord;

// ─── Configuration ───────────────────────────────────────────────

/// HdrHistogram range: 1 μs → 1 h, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 3_600_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// Lifetime rollup for one endpoint. Never decremented by ledger eviction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointStats {
    pub calls: u64,
    /// Running mean over every call ever seen, in seconds
    pub avg_response_time: f64,
    pub error_count: u64,
    pub error_rate_percent: f64,
    pub last_called: DateTime<Utc>,
}

impl EndpointStats {
    fn first(record: &RequestRecord) -> Self {
        Self {
            calls: 0,
            avg_response_time: 0.0,
            error_count: 0,
            error_rate_percent: 0.0,
            last_called: record.timestamp,
        }
    }

    fn update(&mut self, record: &RequestRecord) {
        self.calls += 1;
        self.avg_response_time +=
            (record.duration_seconds - self.avg_response_time) / self.calls as f64;
        if record.is_error() {
            self.error_count += 1;
        }
        self.error_rate_percent = percent(self.error_count, self.calls);
        if record.timestamp > self.last_called {
            self.last_called = record.timestamp;
        }
    }

    /// Copy with the average rounded to 3 places and the rate to 2, for display.
    pub fn rounded(&self) -> Self {
        Self {
            avg_response_time: round_to(self.avg_response_time, 3),
            error_rate_percent: round_to(self.error_rate_percent, 2),
            ..self.clone()
        }
    }
}

/// Point-in-time copy of everything the aggregator knows.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSnapshot {
    pub endpoints: BTreeMap<String, EndpointStats>,
    pub total_calls: u64,
    pub total_errors: u64,
    pub error_rate_percent: f64,
    /// Overall running mean across endpoints, in seconds
    pub avg_response_time: f64,
    pub latency: PercentileSet,
}

impl AggregateSnapshot {
    /// Highest per-endpoint error rate, 0 when nothing was recorded.
    pub fn worst_endpoint_error_rate(&self) -> f64 {
        self.endpoints
            .values()
            .map(|s| s.error_rate_percent)
            .fold(0.0, f64::max)
    }
}

/// Incremental per-endpoint rollups fed by every recorded request.
pub struct EndpointAggregator {
    endpoints: HashMap<String, EndpointStats>,
    total_calls: u64,
    total_errors: u64,
    avg_response_time: f64,
    latency_hist: Histogram<u64>,
}

impl EndpointAggregator {
    pub fn new() -> Self {
        Self {
            endpoints: HashMap::new(),
            total_calls: 0,
            total_errors: 0,
            avg_response_time: 0.0,
            latency_hist: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
        }
    }

    pub fn update(&mut self, record: &RequestRecord) {
        self.endpoints
            .entry(record.endpoint.to_string())
            .or_insert_with(|| EndpointStats::first(record))
            .update(record);

        // ── Overall totals ──────────────────────────────────────
        self.total_calls += 1;
        if record.is_error() {
            self.total_errors += 1;
        }
        self.avg_response_time +=
            (record.duration_seconds - self.avg_response_time) / self.total_calls as f64;

        // ── Histogram (clamp to ≥ 1 μs) ─────────────────────────
        let us = ((record.duration_seconds * 1_000_000.0) as u64).max(HIST_LOW);
        self.latency_hist.saturating_record(us);
    }

    pub fn get(&self, endpoint_key: &str) -> Option<&EndpointStats> {
        self.endpoints.get(endpoint_key)
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            endpoints: self
                .endpoints
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            total_calls: self.total_calls,
            total_errors: self.total_errors,
            error_rate_percent: percent(self.total_errors, self.total_calls),
            avg_response_time: self.avg_response_time,
            latency: PercentileSet::from_histogram(&self.latency_hist),
        }
    }
}

impl Default for EndpointAggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
