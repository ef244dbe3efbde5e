//! Shared identifiers, the brick unit, and timing knobs used across the system.

use std::time::Duration;

/// Index of a worker thread, assigned at spawn time.
pub type WorkerId = usize;

/// A single weighted unit moving from a worker to the truck.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Brick {
    /// Mass in abstract weight units; always positive.
    pub mass: u32,
}

impl Brick {
    pub fn new(mass: u32) -> Self {
        debug_assert!(mass > 0, "brick mass must be positive");
        Self { mass }
    }
}

/// Delay knobs for the simulation. The reference values model physical
/// transit and handling; benchmarks and tests shrink them.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    /// Back-off between admission attempts in `Belt::add`.
    pub retry_interval: Duration,
    /// How long a worker's "added" lamp stays lit.
    pub added_lamp_hold: Duration,
    /// How long the belt-full and truck-full lamps stay lit.
    pub full_lamp_hold: Duration,
    /// Simulated truck travel/dock time before draining or unloading.
    pub dock_delay: Duration,
    /// Per-brick pacing while loading the truck.
    pub load_pacing: Duration,
}

impl Timing {
    /// Reference delays for the interactive demo.
    pub fn reference() -> Self {
        Self {
            retry_interval: Duration::from_millis(50),
            added_lamp_hold: Duration::from_millis(500),
            full_lamp_hold: Duration::from_millis(1000),
            dock_delay: Duration::from_millis(3000),
            load_pacing: Duration::from_millis(50),
        }
    }

    /// Compressed delays for benchmarks and tests.
    pub fn fast() -> Self {
        Self {
            retry_interval: Duration::from_millis(1),
            added_lamp_hold: Duration::from_millis(5),
            full_lamp_hold: Duration::from_millis(10),
            dock_delay: Duration::from_millis(10),
            load_pacing: Duration::ZERO,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::reference()
    }
}
