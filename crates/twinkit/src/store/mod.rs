//! Concurrent record storage for twin resources.
//!
//! # Module Structure
//!
//! - `record_store` - generic keyed container with deterministic IDs
//! - `pagination` - cursor pagination over an ordered listing

mod pagination;
mod record_store;

pub use pagination::{paginate, start_position, window, Page, Window};
pub use record_store::RecordStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshot bytes or values could not be decoded into records.
    #[error("failed to decode state: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("unknown resource '{0}'")]
    UnknownResource(String),
    #[error("invalid state document: {0}")]
    InvalidShape(String),
}
