//! Route dispatch for the Admin API.

use crate::admin_api::handlers::{state, system, webhooks};
use crate::admin_api::types::not_found;
use crate::twin::Twin;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::sync::Arc;
use tracing::debug;

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    twin: Arc<Twin>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Admin API: {} {}", method, path);

    let response = route_by_path(&method, &path, req, twin).await;
    Ok(response)
}

async fn route_by_path(
    method: &Method,
    path: &str,
    req: Request<Incoming>,
    twin: Arc<Twin>,
) -> Response<Full<Bytes>> {
    match (method, path.trim_end_matches('/')) {
        (&Method::GET, "/health") => system::handle_health(),
        (&Method::GET, "/metrics") => system::handle_metrics(),

        (&Method::GET, "/admin/state") => state::handle_snapshot(twin),
        (&Method::POST, "/admin/state") => state::handle_load(req, twin).await,
        (&Method::POST, "/admin/reset") => state::handle_reset(twin),

        (&Method::GET, "/admin/webhooks") => webhooks::handle_list(twin),
        (&Method::POST, "/admin/webhooks/flush") => webhooks::handle_flush(twin).await,

        (&Method::GET, "/admin/time") => system::handle_time(twin),
        (&Method::POST, "/admin/time/advance") => system::handle_advance_time(req, twin).await,

        _ => not_found(),
    }
}
