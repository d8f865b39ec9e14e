//! Simulated time for twins.
//!
//! `SimClock` reports wall-clock time shifted by an adjustable offset, so a
//! test can jump a twin forward (expire a trial, age an invoice) without
//! waiting. It is also the scheduling primitive for webhook retry waits:
//! in virtual-sleep mode a wait advances the offset instead of blocking.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("clock cannot be moved backwards by {0}s; rewinding is disabled")]
    RewindNotPermitted(i64),
    #[error("clock offset overflow")]
    Overflow,
}

/// How `SimClock::sleep` waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SleepMode {
    /// Block on `tokio::time::sleep`.
    #[default]
    Real,
    /// Advance the offset by the requested duration and yield.
    Virtual,
}

#[derive(Debug, Default)]
pub struct SimClock {
    offset: RwLock<ChronoDuration>,
    sleep_mode: SleepMode,
    allow_rewind: bool,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock whose sleeps complete instantly by advancing simulated time.
    pub fn virtual_sleep() -> Self {
        Self {
            sleep_mode: SleepMode::Virtual,
            ..Self::default()
        }
    }

    pub fn with_sleep_mode(mut self, mode: SleepMode) -> Self {
        self.sleep_mode = mode;
        self
    }

    pub fn allow_rewind(mut self, allow: bool) -> Self {
        self.allow_rewind = allow;
        self
    }

    pub fn sleep_mode(&self) -> SleepMode {
        self.sleep_mode
    }

    /// Wall-clock time plus the current offset, saturating at the ends of
    /// the `DateTime` range.
    pub fn now(&self) -> DateTime<Utc> {
        let offset = *self.offset.read();
        Utc::now()
            .checked_add_signed(offset)
            .unwrap_or(if offset < ChronoDuration::zero() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            })
    }

    pub fn offset(&self) -> ChronoDuration {
        *self.offset.read()
    }

    /// Shift simulated time. Returns the new offset.
    pub fn advance(&self, by: ChronoDuration) -> Result<ChronoDuration, ClockError> {
        if by < ChronoDuration::zero() && !self.allow_rewind {
            return Err(ClockError::RewindNotPermitted(by.num_seconds()));
        }
        let mut offset = self.offset.write();
        let next = offset.checked_add(&by).ok_or(ClockError::Overflow)?;
        if Utc::now().checked_add_signed(next).is_none() {
            return Err(ClockError::Overflow);
        }
        *offset = next;
        debug!("Clock advanced by {}s (offset now {}s)", by.num_seconds(), offset.num_seconds());
        Ok(*offset)
    }

    /// Forward-only convenience over `advance`.
    pub fn advance_std(&self, by: Duration) -> Result<ChronoDuration, ClockError> {
        let by = ChronoDuration::from_std(by).map_err(|_| ClockError::Overflow)?;
        self.advance(by)
    }

    pub fn reset(&self) {
        *self.offset.write() = ChronoDuration::zero();
    }

    /// Wait for `duration` according to the sleep mode.
    pub fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        match self.sleep_mode {
            SleepMode::Real => tokio::time::sleep(duration).boxed(),
            SleepMode::Virtual => {
                // Saturate at the latest representable time.
                let ceiling = DateTime::<Utc>::MAX_UTC.signed_duration_since(Utc::now());
                let by = ChronoDuration::from_std(duration).unwrap_or(ceiling);
                let mut offset = self.offset.write();
                *offset = match offset.checked_add(&by) {
                    Some(next) if next <= ceiling => next,
                    _ => {
                        warn!(
                            "Virtual sleep of {:?} clamped to the end of representable time",
                            duration
                        );
                        ceiling
                    }
                };
                drop(offset);
                tokio::task::yield_now().boxed()
            }
        }
    }
}
