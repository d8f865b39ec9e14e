//! State handlers: snapshot, load, reset.

use crate::admin_api::types::*;
use crate::store::StoreError;
use crate::twin::Twin;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

/// GET /admin/state - Snapshot of every store
pub fn handle_snapshot(twin: Arc<Twin>) -> Response<Full<Bytes>> {
    match twin.snapshot() {
        Ok(snapshot) => json_response(StatusCode::OK, &snapshot),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// POST /admin/state - Replace every store from a snapshot document
pub async fn handle_load(req: Request<Incoming>, twin: Arc<Twin>) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    match twin.load_state(&body) {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({"status": "loaded"})),
        Err(e @ StoreError::Encode(_)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

/// POST /admin/reset - Empty every store and the webhook queue
pub fn handle_reset(twin: Arc<Twin>) -> Response<Full<Bytes>> {
    twin.reset();
    json_response(StatusCode::OK, &serde_json::json!({"status": "reset"}))
}
