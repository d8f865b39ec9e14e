//! Dispatcher errors. Only construction can fail; delivery failures are data.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("webhook target URL is required")]
    MissingTargetUrl,
    #[error("invalid webhook target URL '{0}'")]
    InvalidTargetUrl(String),
    #[error("invalid dispatcher configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Why a single send did not produce a status code.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}
