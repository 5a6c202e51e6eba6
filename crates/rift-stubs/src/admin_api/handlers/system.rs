//! System handlers: health and status.

use crate::admin_api::server::AdminState;
use crate::admin_api::types::{json_response, StatusReport};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// GET /health - Health check
pub fn handle_health() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &serde_json::json!({"status": "ok"}))
}

/// GET /status - Stub counts and per-stub hits
pub fn handle_status(state: &AdminState) -> Response<Full<Bytes>> {
    let snapshot = state.repository.snapshot();
    let report = StatusReport {
        version: env!("CARGO_PKG_VERSION"),
        stubs: snapshot.entries().len(),
        proxy_configs: snapshot.proxy_configs().len(),
        started_at: state.started_at_utc.to_rfc3339(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        resources: state.repository.resource_stats(),
    };
    json_response(StatusCode::OK, &report)
}
