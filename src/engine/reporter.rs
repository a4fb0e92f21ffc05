//! Interval bookkeeping for the periodic reporter and the pin debounce
//! table.
//!
//! This is pure timing state: every method takes the current instant and
//! answers "is this publish due now", latching its own bookkeeping as a
//! side effect. The engine performs the actual publishes so this module
//! stays free of transport generics.

use embassy_time::{Duration, Instant};
use heapless::Vec;
use heapless::index_map::FnvIndexMap;

use crate::device::SIGNAL_UNAVAILABLE;
use crate::gpio::MAX_PINS;

/// Fixed interval of the maintenance block.
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);

/// Fixed interval of the version-update check.
pub const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct PeriodicReporter {
    last_signal_at: Option<Instant>,
    last_signal: i8,
    last_maintenance_at: Option<Instant>,
    last_update_check_at: Option<Instant>,
    version_published: bool,
    pin_pending: FnvIndexMap<u8, Instant, MAX_PINS>,
}

impl PeriodicReporter {
    pub fn new() -> Self {
        Self {
            last_signal_at: None,
            last_signal: SIGNAL_UNAVAILABLE,
            last_maintenance_at: None,
            last_update_check_at: None,
            version_published: false,
            pin_pending: FnvIndexMap::new(),
        }
    }

    /// Whether a signal-strength publish is due.
    ///
    /// Requires a valid reading, an elapsed interval and a changed value.
    /// The interval clock advances whenever it has elapsed, even if the
    /// value is unchanged, so a stable signal does not pile up instantly
    /// due publishes.
    pub fn signal_due(&mut self, now: Instant, interval: Duration, value: i8) -> bool {
        if value == SIGNAL_UNAVAILABLE {
            return false;
        }
        let elapsed = match self.last_signal_at {
            None => true,
            Some(at) => now > at + interval,
        };
        if !elapsed {
            return false;
        }
        self.last_signal_at = Some(now);
        if value == self.last_signal {
            return false;
        }
        self.last_signal = value;
        true
    }

    /// Whether the 30 s maintenance block is due. The first call after
    /// boot is always due.
    pub fn maintenance_due(&mut self, now: Instant) -> bool {
        let due = match self.last_maintenance_at {
            None => true,
            Some(at) => now > at + MAINTENANCE_INTERVAL,
        };
        if due {
            self.last_maintenance_at = Some(now);
        }
        due
    }

    /// One-shot latch for the firmware-version publish.
    pub fn take_version_pending(&mut self) -> bool {
        let pending = !self.version_published;
        self.version_published = true;
        pending
    }

    /// Whether the 24 h update check is due. The period clock advances
    /// when this returns `true`, before the caller runs the fetch, so a
    /// failing fetch waits out a full period instead of hammering.
    pub fn update_check_due(&mut self, now: Instant) -> bool {
        let due = match self.last_update_check_at {
            None => true,
            Some(at) => now > at + UPDATE_CHECK_INTERVAL,
        };
        if due {
            self.last_update_check_at = Some(now);
        }
        due
    }

    /// Record an observed input transition. A later transition on the
    /// same pin restarts its debounce window.
    pub fn note_pin_event(&mut self, pin: u8, at: Instant) {
        let _ = self.pin_pending.insert(pin, at);
    }

    /// Remove and return every pin whose last transition has stayed
    /// settled for at least `window`.
    pub fn take_settled_pins(&mut self, now: Instant, window: Duration) -> Vec<u8, MAX_PINS> {
        let mut settled: Vec<u8, MAX_PINS> = Vec::new();
        for (pin, at) in self.pin_pending.iter() {
            if *at + window <= now {
                let _ = settled.push(*pin);
            }
        }
        for pin in &settled {
            self.pin_pending.remove(pin);
        }
        settled
    }
}

impl Default for PeriodicReporter {
    fn default() -> Self {
        Self::new()
    }
}
