//! Alert cooldown gate.
//!
//! `AlertThrottle` turns a per-frame breach signal into at most one alert per
//! cooldown window and keeps the running breach tally. Time is passed in
//! explicitly as a monotonic offset so the gate is deterministic under test;
//! `Clock` implementations supply that offset in the running monitor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default minimum interval between two alerts.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Alert emitted when a breach passes the cooldown gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertEvent {
    /// Breach tally including this alert.
    pub breach_count: u64,
    /// Monotonic timestamp the alert was raised at.
    pub at: Duration,
}

/// Cooldown gate and breach counter.
#[derive(Clone, Debug)]
pub struct AlertThrottle {
    cooldown: Duration,
    /// `None` until the first alert, so the first breach always alerts.
    last_alert: Option<Duration>,
    breach_count: u64,
}

impl AlertThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alert: None,
            breach_count: 0,
        }
    }

    /// Feed one frame's breach signal.
    ///
    /// Returns an event only when `breached` is set and at least `cooldown`
    /// has elapsed since the previous alert. Everything else leaves the state
    /// untouched. A timestamp earlier than the last alert is treated as zero
    /// elapsed time.
    pub fn on_frame(&mut self, breached: bool, now: Duration) -> Option<AlertEvent> {
        if !breached {
            return None;
        }
        if let Some(last) = self.last_alert {
            if now.saturating_sub(last) < self.cooldown {
                return None;
            }
        }
        self.breach_count += 1;
        self.last_alert = Some(now);
        Some(AlertEvent {
            breach_count: self.breach_count,
            at: now,
        })
    }

    pub fn breach_count(&self) -> u64 {
        self.breach_count
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn last_alert(&self) -> Option<Duration> {
        self.last_alert
    }
}

impl Default for AlertThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

/// Monotonic time source, as an offset from the clock's own origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// `Instant`-backed clock; immune to wall-clock adjustments.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        self.nanos.store(now.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
