//! Request and response types for the Admin API.

use crate::dispatch::{DeliveryAttempt, Event};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of `GET /admin/webhooks`
#[derive(Debug, Serialize)]
pub struct WebhooksResponse {
    pub events: Vec<Event>,
    pub deliveries: Vec<DeliveryAttempt>,
}

/// Body of `GET /admin/time` and `POST /admin/time/advance`
#[derive(Debug, Serialize)]
pub struct TimeResponse {
    pub now: DateTime<Utc>,
    pub offset_seconds: i64,
}

/// Body accepted by `POST /admin/time/advance`
#[derive(Debug, Deserialize)]
pub struct AdvanceTimeRequest {
    pub seconds: i64,
}

// =============================================================================
// Response helper functions
// =============================================================================

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(json) => build_response(status, "application/json", json),
        Err(e) => build_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "application/json",
            format!(r#"{{"error":"failed to encode response: {e}"}}"#),
        ),
    }
}

/// Build an HTTP response with a content type.
///
/// Falls back to a bare response if the builder rejects its inputs.
pub fn build_response(
    status: StatusCode,
    content_type: &str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let body = body.into();
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(body.clone()))
        .unwrap_or_else(|_| Response::new(Full::new(body)))
}

/// Create an error response
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        &ErrorResponse {
            error: message.to_string(),
        },
    )
}

/// Create a not found response
pub fn not_found() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Collect request body into bytes
pub async fn collect_body(req: Request<Incoming>) -> Result<Bytes, String> {
    use http_body_util::BodyExt;
    req.collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_format() {
        let resp = error_response(StatusCode::BAD_REQUEST, "Test error");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_json_response() {
        let body = serde_json::json!({"test": "value"});
        let resp = json_response(StatusCode::OK, &body);
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_not_found_response() {
        assert_eq!(not_found().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_advance_request_parse() {
        let req: AdvanceTimeRequest = serde_json::from_str(r#"{"seconds": -30}"#).unwrap();
        assert_eq!(req.seconds, -30);
        assert!(serde_json::from_str::<AdvanceTimeRequest>(r#"{"secs": 1}"#).is_err());
    }
}
