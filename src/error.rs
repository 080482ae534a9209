//! Error type shared by the monitoring core.

use std::time::Duration;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration parsed but failed validation, or did not parse at all.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A request observation was rejected at the recording boundary.
    #[error("invalid request record: {0}")]
    InvalidRecord(String),

    /// The host resource query itself failed.
    #[error("resource probe failed: {0}")]
    Probe(String),

    #[error("resource probe timed out after {0:?}")]
    ProbeTimeout(Duration),

    /// The previous probe is still running; this tick is skipped.
    #[error("resource probe still busy with the previous sample")]
    ProbeBusy,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
