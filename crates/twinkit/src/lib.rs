//! Building blocks for digital twins of third-party HTTP APIs.
//!
//! A twin keeps resources in [`RecordStore`]s with deterministic IDs, emits
//! webhooks through a [`Dispatcher`], runs on a controllable [`SimClock`],
//! and exposes snapshot, load, reset and flush through [`Twin`] and the
//! admin API.

// ===== Core building blocks =====
pub mod clock;
pub mod dispatch;
pub mod ids;
pub mod store;

// ===== Composition and hosting =====
pub mod admin_api;
pub mod config;
pub mod metrics;
pub mod twin;

pub use clock::{ClockError, SimClock, SleepMode};
pub use dispatch::{Dispatcher, DispatcherConfig, Event, EventStatus, FlushReport};
pub use ids::IdSequence;
pub use store::{Page, RecordStore, StoreError};
pub use twin::{StateProvider, Twin, WebhookFlusher};
