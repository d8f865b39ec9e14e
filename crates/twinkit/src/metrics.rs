//! Prometheus metrics for twinkit.
//!
//! Tracks store lifecycle and webhook dispatch activity. Served by the admin
//! API on `GET /metrics`.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Events accepted by a dispatcher
    pub static ref EVENTS_ENQUEUED_TOTAL: CounterVec = register_counter_vec!(
        "twinkit_events_enqueued_total",
        "Total number of webhook events enqueued",
        &["type"]
    )
    .unwrap();

    /// Delivery attempts by outcome
    pub static ref DELIVERY_ATTEMPTS_TOTAL: CounterVec = register_counter_vec!(
        "twinkit_delivery_attempts_total",
        "Total number of webhook delivery attempts",
        &["outcome"]  // outcome: success|http_error|transport_error
    )
    .unwrap();

    /// Events reaching a terminal status
    pub static ref EVENTS_TERMINAL_TOTAL: CounterVec = register_counter_vec!(
        "twinkit_events_terminal_total",
        "Total number of events that reached a terminal status",
        &["status"]  // status: delivered|failed
    )
    .unwrap();

    /// Single attempt duration
    pub static ref DELIVERY_DURATION_MS: HistogramVec = register_histogram_vec!(
        "twinkit_delivery_duration_ms",
        "Duration of a single webhook delivery attempt",
        &["outcome"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap();

    /// Store resets
    pub static ref STORE_RESETS_TOTAL: CounterVec = register_counter_vec!(
        "twinkit_store_resets_total",
        "Total number of record store resets",
        &["resource"]
    )
    .unwrap();

    /// State loads through the admin contract
    pub static ref STATE_LOADS_TOTAL: CounterVec = register_counter_vec!(
        "twinkit_state_loads_total",
        "Total number of state loads",
        &["result"]  // result: success|error
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_enqueued(event_type: &str) {
    EVENTS_ENQUEUED_TOTAL.with_label_values(&[event_type]).inc();
}

pub fn record_attempt(outcome: &str, duration_ms: f64) {
    DELIVERY_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
    DELIVERY_DURATION_MS
        .with_label_values(&[outcome])
        .observe(duration_ms);
}

pub fn record_terminal(status: &str) {
    EVENTS_TERMINAL_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_state_load(success: bool) {
    let result = if success { "success" } else { "error" };
    STATE_LOADS_TOTAL.with_label_values(&[result]).inc();
}
