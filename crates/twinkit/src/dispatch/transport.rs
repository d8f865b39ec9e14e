//! Outbound transport used by the delivery engine.

use super::error::{DispatchError, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

/// Sends one POST and reports the response status code.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Bytes,
    ) -> Result<u16, TransportError>;
}

/// `reqwest`-backed transport with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("twinkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DispatchError::Client(e.to_string()))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Bytes,
    ) -> Result<u16, TransportError> {
        let mut request = self.client.post(url).body(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout.as_millis() as u64)
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        Ok(response.status().as_u16())
    }
}
