use axum::{middleware as axum_mw, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::metrics::stream;
use crate::middleware::timing;
use crate::AppState;

/// Builds the Axum `Router` with the monitoring routes and the timing middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Liveness (stateless) ────────────────────────────────
        .route("/health", get(liveness))
        // ── Monitoring queries ──────────────────────────────────
        .route("/api/monitoring/stats", get(stream::get_stats))
        .route("/api/monitoring/health", get(stream::get_health))
        .route("/api/monitoring/stream", get(stream::stats_stream))
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            timing::timing_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Constant "process is up" answer for load balancers.
pub async fn liveness() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
