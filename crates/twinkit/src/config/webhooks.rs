//! Webhook dispatcher configuration.

use crate::dispatch::DispatchError;
use crate::dispatch::DEFAULT_SIGNATURE_HEADER;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted `retry_delay_ms`: one day.
pub const MAX_RETRY_DELAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Settings fixed for a dispatcher's lifetime.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DispatcherConfig {
    /// Where deliveries are POSTed.
    #[serde(default)]
    pub target_url: String,
    /// Shared secret handed to the signer.
    #[serde(default)]
    pub secret: String,
    /// Attempts per event before it is marked failed. At least one attempt is
    /// always made.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_event_prefix")]
    pub event_prefix: String,
    /// Deliver each event as soon as it is enqueued.
    #[serde(default)]
    pub auto_deliver: bool,
    /// Header carrying the default HMAC signature.
    #[serde(default = "default_signature_header")]
    pub signature_header: String,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

fn default_event_prefix() -> String {
    "evt".to_string()
}

fn default_signature_header() -> String {
    DEFAULT_SIGNATURE_HEADER.to_string()
}

impl DispatcherConfig {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            ..Self::default()
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_event_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.event_prefix = prefix.into();
        self
    }

    pub fn with_auto_deliver(mut self, auto_deliver: bool) -> Self {
        self.auto_deliver = auto_deliver;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.target_url.trim().is_empty() {
            return Err(DispatchError::MissingTargetUrl);
        }
        let url = reqwest::Url::parse(&self.target_url)
            .map_err(|_| DispatchError::InvalidTargetUrl(self.target_url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DispatchError::InvalidTargetUrl(self.target_url.clone()));
        }
        if self.event_prefix.is_empty() {
            return Err(DispatchError::InvalidConfig(
                "event_prefix must not be empty".to_string(),
            ));
        }
        if self.retry_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(DispatchError::InvalidConfig(format!(
                "retry_delay_ms must be at most {MAX_RETRY_DELAY_MS}"
            )));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(DispatchError::InvalidConfig(
                "attempt_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            target_url: String::new(),
            secret: String::new(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            event_prefix: default_event_prefix(),
            auto_deliver: false,
            signature_header: default_signature_header(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_yaml() {
        let config: DispatcherConfig =
            serde_yaml::from_str("target_url: http://localhost:3000/hooks").unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.attempt_timeout(), Duration::from_secs(10));
        assert_eq!(config.event_prefix, "evt");
        assert!(!config.auto_deliver);
        assert_eq!(config.signature_header, "X-Twin-Signature");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_target_url_rejected() {
        let err = DispatcherConfig::default().validate().unwrap_err();
        assert!(matches!(err, DispatchError::MissingTargetUrl));
    }

    #[test]
    fn test_non_http_target_rejected() {
        for url in ["ftp://example.com/hooks", "not a url"] {
            let err = DispatcherConfig::new(url).validate().unwrap_err();
            assert!(matches!(err, DispatchError::InvalidTargetUrl(_)), "{url}");
        }
    }

    #[test]
    fn test_retry_delay_upper_bound() {
        let at_limit = DispatcherConfig::new("http://localhost/hooks")
            .with_retry_delay(Duration::from_millis(MAX_RETRY_DELAY_MS));
        assert!(at_limit.validate().is_ok());

        let config: DispatcherConfig = serde_yaml::from_str(
            "target_url: http://localhost/hooks\nretry_delay_ms: 18446744073709551615",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(DispatchError::InvalidConfig(message)) if message.contains("retry_delay_ms")
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = DispatcherConfig::new("http://localhost/hooks")
            .with_attempt_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(DispatchError::InvalidConfig(_))
        ));
    }
}
