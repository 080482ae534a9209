use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use service_monitor::system::{HostProbe, Sampler};
use service_monitor::{config, server, AppState, MetricsCollector};

const CONFIG_ENV: &str = "SERVICE_MONITOR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "monitor.yaml";
const DEFAULT_LOG_FILTER: &str = "service_monitor=info,tower_http=info";

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    // ── 1. Load config ───────────────────────────────────────────
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let cfg = config::load_or_default(&path).expect("config load failed");
    let listen: SocketAddr = cfg.listen.parse().expect("listen validated by config");

    // ── 2. Build the monitoring core ─────────────────────────────
    let metrics = Arc::new(MetricsCollector::new(&cfg));

    // ── 3. Start host sampling ───────────────────────────────────
    let sampler = Sampler::new(HostProbe::new(), metrics.clone(), cfg.sample_timeout())
        .spawn(cfg.sampling_interval());

    // ── 4. Build Axum router ─────────────────────────────────────
    let state = Arc::new(AppState::new(metrics, &cfg));
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .expect("failed to bind listen address");

    tracing::info!(
        %listen,
        max_requests = cfg.max_requests,
        sampling_interval_secs = cfg.sampling_interval_seconds,
        "service-monitor listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server exited with error");

    sampler.stop().await;
    tracing::info!("service-monitor stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
