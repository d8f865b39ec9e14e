//! Event and delivery bookkeeping types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of an outbound event.
///
/// `queued -> delivering -> {delivered | queued (retry) | failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Queued,
    Delivering,
    Delivered,
    Failed,
}

impl EventStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Delivered | EventStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Queued => "queued",
            EventStatus::Delivering => "delivering",
            EventStatus::Delivered => "delivered",
            EventStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub status: EventStatus,
    pub attempts: u32,
    /// Set while a delivery driver owns the event, including its retry waits.
    #[serde(skip)]
    pub(crate) claimed: bool,
}

impl Event {
    pub fn new(id: String, event_type: String, payload: Value, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            event_type,
            payload,
            created_at,
            status: EventStatus::Queued,
            attempts: 0,
            claimed: false,
        }
    }

    /// Body sent to the target.
    pub fn outbound(&self) -> OutboundPayload<'_> {
        OutboundPayload {
            id: &self.id,
            event_type: &self.event_type,
            data: &self.payload,
            created: self.created_at.timestamp(),
        }
    }
}

/// Wire shape of a delivery: `{ id, type, data, created }`.
#[derive(Debug, Serialize)]
pub struct OutboundPayload<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub event_type: &'a str,
    pub data: &'a Value,
    /// Unix seconds.
    pub created: i64,
}

/// Result of one attempt: a status code from the target or a transport error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    StatusCode(u16),
    Error(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::StatusCode(code) if (200..300).contains(code))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            AttemptOutcome::StatusCode(code) => Some(*code),
            AttemptOutcome::Error(_) => None,
        }
    }

    pub(crate) fn metric_label(&self) -> &'static str {
        match self {
            _ if self.is_success() => "success",
            AttemptOutcome::StatusCode(_) => "http_error",
            AttemptOutcome::Error(_) => "transport_error",
        }
    }
}

/// Immutable record of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub event_id: String,
    /// 1-based.
    pub attempt_number: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Summary of a `flush` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub delivered: usize,
    pub failed: usize,
    /// Events another driver had already claimed.
    pub skipped: usize,
}
