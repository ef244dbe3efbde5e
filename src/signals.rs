//! Transient observation lamps for the presentation layer.
//!
//! A lamp is an edge-triggered boolean that auto-clears after a hold
//! duration. Every trigger also bumps a pulse counter, so rapid repeated
//! triggers are never coalesced away even if an observer misses the lit
//! window.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct LampState {
    lit_until: Option<Instant>,
    pulses: u64,
}

pub struct Lamp {
    state: Mutex<LampState>,
}

impl Lamp {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LampState {
                lit_until: None,
                pulses: 0,
            }),
        }
    }

    /// Light the lamp for `hold` and record one pulse.
    pub fn trigger(&self, hold: Duration) {
        let mut guard = self.state.lock().expect("lamp mutex poisoned");
        guard.lit_until = Some(Instant::now() + hold);
        guard.pulses += 1;
    }

    /// Whether the lamp is currently lit. Expiry is evaluated lazily at
    /// read time; no timer thread is involved.
    pub fn is_lit(&self) -> bool {
        let guard = self.state.lock().expect("lamp mutex poisoned");
        matches!(guard.lit_until, Some(until) if Instant::now() < until)
    }

    /// Total number of triggers since construction.
    pub fn pulse_count(&self) -> u64 {
        let guard = self.state.lock().expect("lamp mutex poisoned");
        guard.pulses
    }
}

impl Default for Lamp {
    fn default() -> Self {
        Self::new()
    }
}
