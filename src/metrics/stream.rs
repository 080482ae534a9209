use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::collector::StatsSnapshot;
use crate::health::HealthVerdict;
use crate::AppState;

// ─── Response envelopes ──────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub status: &'static str,
    pub data: StatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub health: HealthVerdict,
}

// ─── GET /api/monitoring/stats ───────────────────────────────────

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        status: "success",
        data: state.metrics.stats(),
    })
}

// ─── GET /api/monitoring/health ──────────────────────────────────

pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "success",
        health: state.metrics.health(),
    })
}

// ─── GET /api/monitoring/stream ──────────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes a full `StatsSnapshot` as JSON every `stream_interval`.

pub async fn stats_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(state.stream_interval);

    let stream = IntervalStream::new(interval).map(move |_| {
        let snapshot = state.metrics.stats();
        let json = serde_json::to_string(&snapshot).unwrap_or_default();
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::health::HealthStatus;
    use crate::metrics::MetricsCollector;

    fn state() -> Arc<AppState> {
        let cfg = MonitorConfig::default();
        Arc::new(AppState::new(Arc::new(MetricsCollector::new(&cfg)), &cfg))
    }

    #[tokio::test]
    async fn stats_route_wraps_snapshot() {
        let state = state();
        state
            .metrics
            .on_request_completed("GET", "/api/test", 200, 0.05, None, None, None);

        let Json(body) = get_stats(State(state)).await;
        assert_eq!(body.status, "success");
        assert_eq!(body.data.total_requests, 1);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["data"]["endpoints"]["GET /api/test"]["calls"], 1);
        assert!(json["data"]["current_system"].is_null());
    }

    #[tokio::test]
    async fn health_route_on_fresh_core() {
        let Json(body) = get_health(State(state())).await;
        assert_eq!(body.health.status, HealthStatus::Healthy);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["health"]["status"], "healthy");
        assert_eq!(json["health"]["issues"], serde_json::json!([]));
    }
}
