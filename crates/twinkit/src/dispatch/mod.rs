//! Outbound webhook dispatch for twins.
//!
//! A `Dispatcher` keeps an ordered list of events, delivers them to a single
//! target with retries, and records every attempt. Events are delivered
//! either explicitly by `flush` or, with `auto_deliver`, by a task spawned
//! per event at enqueue time. Both paths must win the `queued -> delivering`
//! transition before sending, so an event is never driven twice.
//!
//! # Module Structure
//!
//! - `types` - events, attempts, outcomes
//! - `queue` - FIFO event list and the claim gate
//! - `delivery` - one attempt plus the retry decision
//! - `signer` - pluggable header signing
//! - `transport` - outbound HTTP

mod delivery;
mod error;
mod queue;
mod signer;
mod transport;
mod types;

pub use crate::config::DispatcherConfig;
pub use delivery::{next_step, DeliveryEngine, NextStep, CONTENT_TYPE_JSON};
pub use error::{DispatchError, TransportError};
pub use queue::{Claim, EventQueue};
pub use signer::{
    compute_signature, verify_signature, HmacSha256Signer, NoopSigner, Signer,
    DEFAULT_SIGNATURE_HEADER,
};
pub use transport::{HttpTransport, Transport};
pub use types::{
    AttemptOutcome, DeliveryAttempt, Event, EventStatus, FlushReport, OutboundPayload,
};

use crate::clock::SimClock;
use crate::metrics;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Everything the dispatcher mutates, guarded by one lock.
struct State {
    queue: EventQueue,
    deliveries: Vec<DeliveryAttempt>,
}

struct Inner {
    config: DispatcherConfig,
    engine: DeliveryEngine,
    clock: Arc<SimClock>,
    state: Mutex<State>,
    /// Bumped whenever an event settles or the dispatcher resets.
    settled: watch::Sender<u64>,
}

/// How a single drive of an event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drive {
    Settled(EventStatus),
    /// Another driver owns the event.
    Skipped,
    /// The dispatcher was reset mid-delivery.
    Abandoned,
}

/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("target_url", &self.inner.config.target_url)
            .field("events", &self.inner.state.lock().queue.len())
            .finish()
    }
}

pub struct DispatcherBuilder {
    config: DispatcherConfig,
    signer: Option<Arc<dyn Signer>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<SimClock>>,
}

impl DispatcherBuilder {
    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<SimClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and assemble the dispatcher.
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        let config = self.config;
        config.validate()?;

        let signer = self
            .signer
            .unwrap_or_else(|| Arc::new(HmacSha256Signer::new(config.signature_header.clone())));
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(config.attempt_timeout())?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SimClock::new()));

        let engine = DeliveryEngine::new(
            config.target_url.clone(),
            config.secret.clone(),
            signer,
            transport,
            config.attempt_timeout(),
        );
        let (settled, _) = watch::channel(0);

        info!(
            "Webhook dispatcher targeting {} (max_retries={}, retry_delay={}ms, auto_deliver={})",
            config.target_url, config.max_retries, config.retry_delay_ms, config.auto_deliver
        );

        Ok(Dispatcher {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: EventQueue::new(config.event_prefix.clone()),
                    deliveries: Vec::new(),
                }),
                config,
                engine,
                clock,
                settled,
            }),
        })
    }
}

impl Dispatcher {
    pub fn builder(config: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            signer: None,
            transport: None,
            clock: None,
        }
    }

    /// Dispatcher with the default HMAC signer, HTTP transport and a fresh clock.
    pub fn new(config: DispatcherConfig) -> Result<Self, DispatchError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    pub fn clock(&self) -> &Arc<SimClock> {
        &self.inner.clock
    }

    /// Queue an event. Never waits on the network.
    ///
    /// With `auto_deliver`, a delivery task is spawned on the current Tokio
    /// runtime. Outside a runtime the event simply stays queued for `flush`.
    pub fn enqueue(&self, event_type: impl Into<String>, payload: Value) -> Event {
        let event_type = event_type.into();
        let created_at = self.inner.clock.now();
        let (event, epoch) = {
            let mut state = self.inner.state.lock();
            let event = state.queue.push(event_type, payload, created_at);
            (event, state.queue.epoch())
        };

        metrics::record_enqueued(&event.event_type);
        debug!("Enqueued {} ({})", event.id, event.event_type);

        if self.inner.config.auto_deliver {
            self.spawn_delivery(event.id.clone(), epoch);
        }
        event
    }

    fn spawn_delivery(&self, event_id: String, epoch: u64) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let dispatcher = self.clone();
                handle.spawn(async move {
                    dispatcher.drive(&event_id, epoch).await;
                });
            }
            Err(_) => warn!(
                "auto_deliver is on but no Tokio runtime is running; {} waits for flush",
                event_id
            ),
        }
    }

    /// Deliver every event queued at entry, oldest first, to a terminal status.
    ///
    /// Events already claimed by an auto-deliver task are skipped here, but
    /// the call still waits for them to settle. Failed deliveries are reported,
    /// not raised.
    pub async fn flush(&self) -> FlushReport {
        let (pending, epoch) = {
            let state = self.inner.state.lock();
            (state.queue.queued_ids(), state.queue.epoch())
        };
        let mut settled = self.inner.settled.subscribe();
        let mut report = FlushReport::default();

        for id in &pending {
            match self.drive(id, epoch).await {
                Drive::Settled(EventStatus::Delivered) => report.delivered += 1,
                Drive::Settled(_) => report.failed += 1,
                Drive::Skipped => report.skipped += 1,
                // Reset: the remaining IDs may now name newer events.
                Drive::Abandoned => break,
            }
        }

        loop {
            let done = {
                let state = self.inner.state.lock();
                state.queue.epoch() != epoch
                    || pending.iter().all(|id| {
                        state
                            .queue
                            .get(id)
                            .map_or(true, |event| event.status.is_terminal())
                    })
            };
            if done || settled.changed().await.is_err() {
                break;
            }
        }

        debug!(
            "Flush finished: {} delivered, {} failed, {} skipped",
            report.delivered, report.failed, report.skipped
        );
        report
    }

    /// Claim `id` and take it to a terminal status, retrying as configured.
    ///
    /// `epoch` is the queue generation `id` was read from; a reset since then
    /// abandons the drive instead of claiming a newer event with the same ID.
    async fn drive(&self, id: &str, epoch: u64) -> Drive {
        let mut claim = {
            let mut state = self.inner.state.lock();
            if state.queue.epoch() != epoch {
                return Drive::Abandoned;
            }
            match state.queue.claim(id) {
                Some(claim) => claim,
                None => return Drive::Skipped,
            }
        };

        loop {
            // Network I/O happens with no lock held.
            let outcome = self.inner.engine.attempt(&claim.event).await;
            let timestamp = self.inner.clock.now();

            let step = {
                let mut guard = self.inner.state.lock();
                let state = &mut *guard;
                if state.queue.epoch() != claim.epoch {
                    return Drive::Abandoned;
                }
                let Some(event) = state.queue.get_mut(&claim.event.id) else {
                    return Drive::Abandoned;
                };

                event.attempts += 1;
                let step = next_step(&outcome, event.attempts, self.inner.config.max_retries);
                state.deliveries.push(DeliveryAttempt {
                    event_id: event.id.clone(),
                    attempt_number: event.attempts,
                    timestamp,
                    outcome,
                });

                event.status = match step {
                    NextStep::Delivered => EventStatus::Delivered,
                    NextStep::Retry => EventStatus::Queued,
                    NextStep::Failed => EventStatus::Failed,
                };
                if event.status.is_terminal() {
                    event.claimed = false;
                }
                claim.event.attempts = event.attempts;
                step
            };

            match step {
                NextStep::Delivered | NextStep::Failed => {
                    let status = if step == NextStep::Delivered {
                        EventStatus::Delivered
                    } else {
                        EventStatus::Failed
                    };
                    metrics::record_terminal(status.as_str());
                    if status == EventStatus::Failed {
                        warn!(
                            "Event {} failed after {} attempts to {}",
                            claim.event.id,
                            claim.event.attempts,
                            self.inner.engine.target_url()
                        );
                    }
                    self.notify_settled();
                    return Drive::Settled(status);
                }
                NextStep::Retry => {
                    self.inner
                        .clock
                        .sleep(self.inner.config.retry_delay())
                        .await;
                    if !self.inner.state.lock().queue.resume(&claim) {
                        return Drive::Abandoned;
                    }
                }
            }
        }
    }

    fn notify_settled(&self) {
        self.inner.settled.send_modify(|generation| *generation += 1);
    }

    /// Every attempt across all events, in the order they completed.
    pub fn deliveries(&self) -> Vec<DeliveryAttempt> {
        self.inner.state.lock().deliveries.clone()
    }

    pub fn deliveries_for(&self, event_id: &str) -> Vec<DeliveryAttempt> {
        self.inner
            .state
            .lock()
            .deliveries
            .iter()
            .filter(|attempt| attempt.event_id == event_id)
            .cloned()
            .collect()
    }

    /// Events in `queued`, including those waiting for a retry.
    pub fn queued_events(&self) -> Vec<Event> {
        self.events_with_status(EventStatus::Queued)
    }

    pub fn events_with_status(&self, status: EventStatus) -> Vec<Event> {
        self.inner.state.lock().queue.with_status(status)
    }

    pub fn all_events(&self) -> Vec<Event> {
        self.inner.state.lock().queue.all()
    }

    pub fn event(&self, id: &str) -> Option<Event> {
        self.inner.state.lock().queue.get(id).cloned()
    }

    /// Drop all events and history and rewind event IDs.
    ///
    /// Attempts already in flight finish, but their results are discarded.
    pub fn reset(&self) {
        {
            let mut state = self.inner.state.lock();
            state.queue.clear();
            state.deliveries.clear();
        }
        self.notify_settled();
        info!("Webhook dispatcher reset");
    }
}
