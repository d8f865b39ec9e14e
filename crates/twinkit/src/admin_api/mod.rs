//! Admin REST API for a running twin.
//!
//! Test harnesses drive the twin through these endpoints:
//! - Snapshot, load and reset state
//! - Flush and inspect outbound webhooks
//! - Read and advance simulated time
//! - Health and metrics endpoints
//!
//! The API listens on a configurable port (default: 4010).

mod handlers;
mod router;
mod server;
mod types;

pub use server::AdminApiServer;
