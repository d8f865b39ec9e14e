//! Webhook handlers: flush and inspection.

use crate::admin_api::types::*;
use crate::twin::Twin;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

/// POST /admin/webhooks/flush - Deliver everything queued
pub async fn handle_flush(twin: Arc<Twin>) -> Response<Full<Bytes>> {
    match twin.flush_webhooks().await {
        Ok(report) => json_response(StatusCode::OK, &report),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// GET /admin/webhooks - Events and delivery history
pub fn handle_list(twin: Arc<Twin>) -> Response<Full<Bytes>> {
    let body = match twin.dispatcher() {
        Some(dispatcher) => WebhooksResponse {
            events: dispatcher.all_events(),
            deliveries: dispatcher.deliveries(),
        },
        None => WebhooksResponse {
            events: Vec::new(),
            deliveries: Vec::new(),
        },
    };
    json_response(StatusCode::OK, &body)
}
