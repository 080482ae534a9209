//! In-process request monitoring for a web service.
//!
//! Every completed request is pushed into a [`metrics::MetricsCollector`],
//! which keeps a bounded ledger of recent records next to lifetime
//! per-endpoint rollups. A background [`system::Sampler`] polls host CPU,
//! memory and disk usage, and [`health`] turns both into a verdict.

use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod system;

pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use metrics::MetricsCollector;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Process-wide monitoring core; middleware writes, routes read.
    pub metrics: Arc<MetricsCollector>,

    /// Tick period of the SSE stats stream.
    pub stream_interval: Duration,
}

impl AppState {
    pub fn new(metrics: Arc<MetricsCollector>, config: &MonitorConfig) -> Self {
        Self {
            metrics,
            stream_interval: config.stream_interval(),
        }
    }
}
