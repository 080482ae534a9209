use hdrhistogram::Histogram;
use serde::Serialize;

/// A complete latency percentile breakdown, in milliseconds.
/// Serialized straight into the stats snapshot and used by percentile health rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileSet {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub p999_ms: f64,
    pub count: u64,
}

impl PercentileSet {
    /// Extract a full percentile set from a histogram recorded in microseconds.
    /// Returns zeroed values if the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        Self {
            min_ms: us_to_ms(hist.min()),
            max_ms: us_to_ms(hist.max()),
            mean_ms: hist.mean() / 1000.0,
            p50_ms: us_to_ms(hist.value_at_percentile(50.0)),
            p95_ms: us_to_ms(hist.value_at_percentile(95.0)),
            p99_ms: us_to_ms(hist.value_at_percentile(99.0)),
            p999_ms: us_to_ms(hist.value_at_percentile(99.9)),
            count: hist.len(),
        }
    }

    /// All-zero placeholder used before any requests are recorded.
    pub fn empty() -> Self {
        Self {
            min_ms: 0.0,
            max_ms: 0.0,
            mean_ms: 0.0,
            p50_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            p999_ms: 0.0,
            count: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

fn us_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}
