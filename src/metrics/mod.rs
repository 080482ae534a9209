pub mod aggregator;
pub mod collector;
pub mod ledger;
pub mod percentiles;
pub mod stream;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{MonitorError, Result};

pub use aggregator::{AggregateSnapshot, EndpointAggregator, EndpointStats};
pub use collector::{MetricsCollector, StatsSnapshot};
pub use ledger::Ledger;
pub use percentiles::PercentileSet;

/// An (HTTP method, path) pair, keyed as `"GET /api/users"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
}

impl Endpoint {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A single completed request.
/// This is the "write" side — the middleware creates these and pushes them in.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub endpoint: Endpoint,
    pub status_code: u16,
    /// Wall time from request start to response, in seconds
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    pub client_addr: Option<String>,
    pub user_agent: Option<String>,
    /// Set when the handler failed with an error rather than a status code
    pub error_message: Option<String>,
}

impl RequestRecord {
    /// A record stamped with the current time and no client metadata.
    pub fn new(endpoint: Endpoint, status_code: u16, duration_seconds: f64) -> Self {
        Self {
            endpoint,
            status_code,
            duration_seconds,
            timestamp: Utc::now(),
            client_addr: None,
            user_agent: None,
            error_message: None,
        }
    }

    /// Status >= 400 or an explicit error message; either way it counts once.
    pub fn is_error(&self) -> bool {
        self.status_code >= 400 || self.error_message.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.method.trim().is_empty() {
            return Err(MonitorError::InvalidRecord("missing method".into()));
        }
        if self.endpoint.path.trim().is_empty() {
            return Err(MonitorError::InvalidRecord("missing path".into()));
        }
        if !self.duration_seconds.is_finite() || self.duration_seconds < 0.0 {
            return Err(MonitorError::InvalidRecord(format!(
                "duration must be a non-negative number of seconds, got {}",
                self.duration_seconds
            )));
        }
        Ok(())
    }
}
