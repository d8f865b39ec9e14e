//! Pluggable signing of outbound deliveries.
//!
//! Each cloned API authenticates its webhooks differently; a twin picks (or
//! writes) a `Signer` and the delivery engine merges whatever headers it
//! returns into the request.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SIGNATURE_HEADER: &str = "X-Twin-Signature";

pub trait Signer: Send + Sync + Debug {
    /// Header name to value map authenticating `payload`.
    fn sign(&self, payload: &[u8], secret: &str) -> HashMap<String, String>;
}

/// `<header>: sha256=<hex hmac-sha256 of the body>`.
#[derive(Debug, Clone)]
pub struct HmacSha256Signer {
    header: String,
}

impl HmacSha256Signer {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Default for HmacSha256Signer {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE_HEADER)
    }
}

impl Signer for HmacSha256Signer {
    fn sign(&self, payload: &[u8], secret: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        match compute_signature(payload, secret) {
            Some(hex) => {
                headers.insert(self.header.clone(), format!("sha256={hex}"));
            }
            None => warn!("Could not initialise HMAC; sending delivery unsigned"),
        }
        headers
    }
}

/// Sends no authentication headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

impl Signer for NoopSigner {
    fn sign(&self, _payload: &[u8], _secret: &str) -> HashMap<String, String> {
        HashMap::new()
    }
}

/// Hex HMAC-SHA256 of `payload` keyed by `secret`.
pub fn compute_signature(payload: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a `sha256=<hex>` header value.
pub fn verify_signature(payload: &[u8], secret: &str, header_value: &str) -> bool {
    let Some(hex_sig) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
