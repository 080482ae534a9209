use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{ResourceProbe, SystemSnapshot};
use crate::error::{MonitorError, Result};
use crate::metrics::MetricsCollector;

/// Periodically probes the host and publishes snapshots into the collector.
pub struct Sampler {
    probe: Arc<Mutex<Box<dyn ResourceProbe>>>,
    metrics: Arc<MetricsCollector>,
    timeout: Duration,
}

impl Sampler {
    pub fn new(
        probe: impl ResourceProbe,
        metrics: Arc<MetricsCollector>,
        timeout: Duration,
    ) -> Self {
        let probe: Box<dyn ResourceProbe> = Box::new(probe);
        Self {
            probe: Arc::new(Mutex::new(probe)),
            metrics,
            timeout,
        }
    }

    /// Take one sample now.
    ///
    /// The probe runs on the blocking pool. On failure, timeout, or while a
    /// previous probe is still running, nothing is published and the
    /// collector keeps its previous snapshot.
    pub async fn sample(&self) -> Result<SystemSnapshot> {
        let probe = self.probe.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<SystemSnapshot> {
            let mut guard = probe.try_lock().ok_or(MonitorError::ProbeBusy)?;
            guard.probe()
        });

        let snapshot = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => return Err(MonitorError::ProbeTimeout(self.timeout)),
            Ok(Err(join_err)) => {
                return Err(MonitorError::Probe(format!("probe task failed: {join_err}")))
            }
            Ok(Ok(result)) => result?,
        };

        self.metrics.record_system(snapshot.clone());
        Ok(snapshot)
    }

    /// Most recent published snapshot, `None` before the first success.
    pub fn latest(&self) -> Option<SystemSnapshot> {
        self.metrics.latest_system()
    }

    /// Start the timer loop. The first sample is taken immediately.
    pub fn spawn(self, interval: Duration) -> SamplerHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(sampler_task(self, interval, cancel_rx));
        SamplerHandle {
            cancel_tx: Some(cancel_tx),
            task,
        }
    }
}

/// Owns the running sampler task; `stop` ends it.
pub struct SamplerHandle {
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// Signal the loop to exit and wait for it.
    /// Dropping the handle without calling this also ends the loop.
    pub async fn stop(mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            // receiver already gone means the task has ended
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "system sampler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn sampler_task(
    sampler: Sampler,
    interval: Duration,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "system monitoring started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut cancel_rx => break,
            _ = ticker.tick() => {
                match sampler.sample().await {
                    Ok(s) => tracing::debug!(
                        cpu = s.cpu_percent,
                        memory = s.memory_percent,
                        disk = s.disk_usage_percent,
                        "system sample taken"
                    ),
                    Err(e) => tracing::error!(error = %e, "system monitoring error, sample skipped"),
                }
            }
        }
    }

    tracing::info!("system monitoring stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use chrono::Utc;
    use std::collections::VecDeque;

    fn snapshot(cpu: f64) -> SystemSnapshot {
        SystemSnapshot {
            cpu_percent: cpu,
            memory_percent: 40.0,
            memory_used_mb: 4096.0,
            memory_available_mb: 6144.0,
            disk_usage_percent: 55.0,
            timestamp: Utc::now(),
        }
    }

    /// Replays a fixed script of results, then keeps failing.
    struct ScriptedProbe(VecDeque<Result<SystemSnapshot>>);

    impl ResourceProbe for ScriptedProbe {
        fn probe(&mut self) -> Result<SystemSnapshot> {
            self.0
                .pop_front()
                .unwrap_or_else(|| Err(MonitorError::Probe("script exhausted".into())))
        }
    }

    struct SlowProbe(Duration);

    impl ResourceProbe for SlowProbe {
        fn probe(&mut self) -> Result<SystemSnapshot> {
            std::thread::sleep(self.0);
            Ok(snapshot(1.0))
        }
    }

    fn collector() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new(&MonitorConfig::default()))
    }

    #[tokio::test]
    async fn failure_keeps_previous_snapshot() {
        let metrics = collector();
        let probe = ScriptedProbe(VecDeque::from(vec![
            Ok(snapshot(12.0)),
            Err(MonitorError::Probe("permission denied".into())),
        ]));
        let sampler = Sampler::new(probe, metrics.clone(), Duration::from_secs(1));

        assert!(sampler.latest().is_none());
        assert_eq!(sampler.sample().await.unwrap().cpu_percent, 12.0);
        assert!(sampler.sample().await.is_err());
        assert_eq!(sampler.latest().map(|s| s.cpu_percent), Some(12.0));
        assert_eq!(metrics.system_history().len(), 1);
    }

    #[tokio::test]
    async fn stuck_probe_times_out_then_reports_busy() {
        let metrics = collector();
        let sampler = Sampler::new(
            SlowProbe(Duration::from_millis(400)),
            metrics.clone(),
            Duration::from_millis(50),
        );

        assert!(matches!(
            sampler.sample().await,
            Err(MonitorError::ProbeTimeout(_))
        ));
        // the first probe still holds the lock on the blocking pool
        assert!(matches!(sampler.sample().await, Err(MonitorError::ProbeBusy)));
        assert!(sampler.latest().is_none());

        // recording is never blocked by the stuck probe
        metrics.on_request_completed("GET", "/x", 200, 0.01, None, None, None);
        assert_eq!(metrics.total_requests(), 1);
    }

    #[tokio::test]
    async fn spawned_loop_samples_and_stops() {
        let metrics = collector();
        let probe = ScriptedProbe(VecDeque::from(vec![Ok(snapshot(5.0)), Ok(snapshot(6.0))]));
        let handle = Sampler::new(probe, metrics.clone(), Duration::from_secs(1))
            .spawn(Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!handle.is_finished());
        handle.stop().await;

        assert_eq!(metrics.latest_system().map(|s| s.cpu_percent), Some(6.0));
    }
}
