//! Monitor config loader (strict YAML parsing).

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{MonitorError, Result};
use crate::health::HealthConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Address the HTTP binding listens on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Ledger capacity (individual request records kept).
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    #[serde(default = "default_sampling_interval_seconds")]
    pub sampling_interval_seconds: u64,

    /// Upper bound on a single host probe.
    #[serde(default = "default_sample_timeout_seconds")]
    pub sample_timeout_seconds: u64,

    /// Window used for the "recent requests" count.
    #[serde(default = "default_recent_window_seconds")]
    pub recent_window_seconds: u64,

    /// How many system snapshots are kept as trailing history.
    #[serde(default = "default_system_history")]
    pub system_history: usize,

    /// Requests slower than this are logged at warn level.
    #[serde(default = "default_slow_request_seconds")]
    pub slow_request_seconds: f64,

    #[serde(default = "default_stream_interval_ms")]
    pub stream_interval_ms: u64,

    #[serde(default)]
    pub health: HealthConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_requests: default_max_requests(),
            sampling_interval_seconds: default_sampling_interval_seconds(),
            sample_timeout_seconds: default_sample_timeout_seconds(),
            recent_window_seconds: default_recent_window_seconds(),
            system_history: default_system_history(),
            slow_request_seconds: default_slow_request_seconds(),
            stream_interval_ms: default_stream_interval_ms(),
            health: HealthConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<SocketAddr>().is_err() {
            return Err(MonitorError::InvalidConfig(format!(
                "listen must be a valid socket address, got {:?}",
                self.listen
            )));
        }
        if self.max_requests == 0 {
            return Err(MonitorError::InvalidConfig(
                "max_requests must be at least 1".into(),
            ));
        }
        if self.sampling_interval_seconds == 0 {
            return Err(MonitorError::InvalidConfig(
                "sampling_interval_seconds must be at least 1".into(),
            ));
        }
        if self.sample_timeout_seconds == 0
            || self.sample_timeout_seconds >= self.sampling_interval_seconds
        {
            return Err(MonitorError::InvalidConfig(
                "sample_timeout_seconds must be between 1 and sampling_interval_seconds - 1".into(),
            ));
        }
        if self.recent_window_seconds == 0 {
            return Err(MonitorError::InvalidConfig(
                "recent_window_seconds must be at least 1".into(),
            ));
        }
        if self.system_history == 0 {
            return Err(MonitorError::InvalidConfig(
                "system_history must be at least 1".into(),
            ));
        }
        if !self.slow_request_seconds.is_finite() || self.slow_request_seconds <= 0.0 {
            return Err(MonitorError::InvalidConfig(
                "slow_request_seconds must be a positive number".into(),
            ));
        }
        if self.stream_interval_ms < 100 {
            return Err(MonitorError::InvalidConfig(
                "stream_interval_ms must be at least 100".into(),
            ));
        }

        self.health.validate()?;

        Ok(())
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.sampling_interval_seconds)
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_secs(self.sample_timeout_seconds)
    }

    pub fn recent_window(&self) -> Duration {
        Duration::from_secs(self.recent_window_seconds)
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }
}

pub fn load_from_file(path: impl AsRef<Path>) -> Result<MonitorConfig> {
    let s = fs::read_to_string(path)?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<MonitorConfig> {
    let cfg: MonitorConfig = serde_yaml::from_str(s)
        .map_err(|e| MonitorError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Like [`load_from_file`], but a missing file yields the built-in defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<MonitorConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        return Ok(MonitorConfig::default());
    }
    load_from_file(path)
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}
fn default_max_requests() -> usize {
    1000
}
fn default_sampling_interval_seconds() -> u64 {
    30
}
fn default_sample_timeout_seconds() -> u64 {
    5
}
fn default_recent_window_seconds() -> u64 {
    300
}
fn default_system_history() -> usize {
    100
}
fn default_slow_request_seconds() -> f64 {
    10.0
}
fn default_stream_interval_ms() -> u64 {
    1000
}
