//! Single delivery attempts and the retry decision.

use super::signer::Signer;
use super::transport::Transport;
use super::types::{AttemptOutcome, Event};
use crate::metrics;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// What the driver does after recording an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Delivered,
    /// Wait `retry_delay`, then attempt again.
    Retry,
    Failed,
}

/// `attempts` already counts the attempt that produced `outcome`.
pub fn next_step(outcome: &AttemptOutcome, attempts: u32, max_retries: u32) -> NextStep {
    if outcome.is_success() {
        NextStep::Delivered
    } else if attempts < max_retries {
        NextStep::Retry
    } else {
        NextStep::Failed
    }
}

#[derive(Debug)]
pub struct DeliveryEngine {
    target_url: String,
    secret: String,
    signer: Arc<dyn Signer>,
    transport: Arc<dyn Transport>,
    attempt_timeout: Duration,
}

impl DeliveryEngine {
    pub fn new(
        target_url: impl Into<String>,
        secret: impl Into<String>,
        signer: Arc<dyn Signer>,
        transport: Arc<dyn Transport>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            target_url: target_url.into(),
            secret: secret.into(),
            signer,
            transport,
            attempt_timeout,
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Body and headers for `event`. Signer headers win over `Content-Type`.
    pub fn build_request(
        &self,
        event: &Event,
    ) -> Result<(HashMap<String, String>, Bytes), serde_json::Error> {
        let body = serde_json::to_vec(&event.outbound())?;
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string());
        headers.extend(self.signer.sign(&body, &self.secret));
        Ok((headers, Bytes::from(body)))
    }

    /// Perform one attempt. Never fails: every problem becomes an outcome.
    pub async fn attempt(&self, event: &Event) -> AttemptOutcome {
        let start = Instant::now();
        let outcome = match self.build_request(event) {
            Ok((headers, body)) => {
                let send = self.transport.post(&self.target_url, &headers, body);
                match tokio::time::timeout(self.attempt_timeout, send).await {
                    Ok(Ok(status)) => AttemptOutcome::StatusCode(status),
                    Ok(Err(e)) => AttemptOutcome::Error(e.to_string()),
                    Err(_) => AttemptOutcome::Error(format!(
                        "request timed out after {}ms",
                        self.attempt_timeout.as_millis()
                    )),
                }
            }
            Err(e) => AttemptOutcome::Error(format!("failed to encode payload: {e}")),
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::record_attempt(outcome.metric_label(), elapsed_ms);
        if outcome.is_success() {
            debug!("Delivered {} to {} ({:?})", event.id, self.target_url, outcome);
        } else {
            warn!(
                "Delivery of {} to {} failed: {:?}",
                event.id, self.target_url, outcome
            );
        }
        outcome
    }
}
