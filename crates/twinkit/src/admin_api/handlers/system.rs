//! System handlers: health, metrics, simulated time.

use crate::admin_api::types::*;
use crate::metrics::gather_metrics;
use crate::twin::Twin;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

/// GET /health - Health check
pub fn handle_health() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &serde_json::json!({"status": "ok"}))
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics() -> Response<Full<Bytes>> {
    build_response(StatusCode::OK, "text/plain; version=0.0.4", gather_metrics())
}

fn time_response(twin: &Twin) -> TimeResponse {
    let clock = twin.clock();
    TimeResponse {
        now: clock.now(),
        offset_seconds: clock.offset().num_seconds(),
    }
}

/// GET /admin/time - Current simulated time
pub fn handle_time(twin: Arc<Twin>) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &time_response(&twin))
}

/// POST /admin/time/advance - Move simulated time by `seconds`
pub async fn handle_advance_time(
    req: Request<Incoming>,
    twin: Arc<Twin>,
) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let request: AdvanceTimeRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {e}"))
        }
    };

    let Some(by) = chrono::Duration::try_seconds(request.seconds) else {
        return error_response(StatusCode::BAD_REQUEST, "seconds out of range");
    };

    match twin.clock().advance(by) {
        Ok(_) => json_response(StatusCode::OK, &time_response(&twin)),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}
