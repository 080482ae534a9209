use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

/// Routes whose duration is a connection lifetime, not a request latency.
const UNTIMED_PATHS: &[&str] = &["/api/monitoring/stream"];

/// Endpoint path shared by every request no route matched, so unknown
/// URLs cannot grow the per-endpoint table.
pub const UNMATCHED_PATH: &str = "<unmatched>";

/// Tower-compatible middleware that records every completed request into
/// the monitoring core and adds two response headers:
///
///   X-Response-Time-Us  — total handler wall time in microseconds
///   Server-Timing       — same value in the standard Server-Timing format
pub async fn timing_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    // route template (`/api/users/:id`), never the raw URI
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_PATH.to_owned());
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let client_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = elapsed.as_micros().to_string().parse() {
        response.headers_mut().insert("x-response-time-us", val);
    }

    let server_timing =
        format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("server-timing", val);
    }

    // ── Record ──────────────────────────────────────────────────
    if !UNTIMED_PATHS.contains(&path.as_str()) {
        state.metrics.on_request_completed(
            method.as_str(),
            &path,
            response.status().as_u16(),
            elapsed.as_secs_f64(),
            client_addr.as_deref(),
            user_agent.as_deref(),
            None,
        );
    }

    response
}
