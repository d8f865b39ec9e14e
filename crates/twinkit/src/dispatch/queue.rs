//! FIFO event list owned by a dispatcher.
//!
//! Not synchronised on its own: the dispatcher keeps it behind its single
//! lock together with the delivery history.

use super::types::{Event, EventStatus};
use crate::ids::IdSequence;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Proof that a driver won the `queued -> delivering` transition.
#[derive(Debug, Clone)]
pub struct Claim {
    pub event: Event,
    /// Queue generation the claim was taken in. A reset invalidates it.
    pub epoch: u64,
}

#[derive(Debug)]
pub struct EventQueue {
    ids: IdSequence,
    events: Vec<Event>,
    epoch: u64,
}

impl EventQueue {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            ids: IdSequence::new(prefix),
            events: Vec::new(),
            epoch: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn push(&mut self, event_type: String, payload: Value, created_at: DateTime<Utc>) -> Event {
        let event = Event::new(self.ids.next_id(), event_type, payload, created_at);
        self.events.push(event.clone());
        event
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Event> {
        self.events.iter_mut().find(|event| event.id == id)
    }

    /// Compare-and-set `queued -> delivering`.
    ///
    /// Fails when the event is unknown, not queued, or already owned by a
    /// driver waiting to retry it.
    pub fn claim(&mut self, id: &str) -> Option<Claim> {
        let epoch = self.epoch;
        let event = self.get_mut(id)?;
        if event.status != EventStatus::Queued || event.claimed {
            return None;
        }
        event.status = EventStatus::Delivering;
        event.claimed = true;
        Some(Claim {
            event: event.clone(),
            epoch,
        })
    }

    /// Move an owned event back to `delivering` after a retry wait.
    /// Returns false if the claim went stale.
    pub fn resume(&mut self, claim: &Claim) -> bool {
        if claim.epoch != self.epoch {
            return false;
        }
        match self.get_mut(&claim.event.id) {
            Some(event) if event.claimed && event.status == EventStatus::Queued => {
                event.status = EventStatus::Delivering;
                true
            }
            _ => false,
        }
    }

    /// IDs of queued events, oldest first.
    pub fn queued_ids(&self) -> Vec<String> {
        self.events
            .iter()
            .filter(|event| event.status == EventStatus::Queued)
            .map(|event| event.id.clone())
            .collect()
    }

    pub fn with_status(&self, status: EventStatus) -> Vec<Event> {
        self.events
            .iter()
            .filter(|event| event.status == status)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Event> {
        self.events.clone()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop every event, rewind IDs and invalidate outstanding claims.
    pub fn clear(&mut self) {
        self.events.clear();
        self.ids.reset();
        self.epoch += 1;
    }
}
