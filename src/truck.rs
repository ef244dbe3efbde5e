//! The single truck: drains the full belt, loads bricks up to its capacity,
//! and resets the belt after unloading.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::{error, info};
use thiserror::Error;

use crate::belt::Belt;
use crate::cancel::StopSignal;
use crate::signals::Lamp;
use crate::types::{Brick, Timing};

/// Loading past capacity is a programming error upstream, never a
/// recoverable condition; correct belt accounting makes it unreachable.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("loading {attempted} onto {loaded}/{capacity} would overload the truck")]
pub struct OverloadError {
    pub attempted: u32,
    pub loaded: u32,
    pub capacity: u32,
}

struct TruckState {
    loaded: Vec<Brick>,
    actual: u32,
}

pub struct Truck {
    capacity: u32,
    state: Mutex<TruckState>,
    full_lamp: Lamp,
    truckloads: AtomicU64,
    overload_seen: AtomicBool,
}

impl Truck {
    pub fn new(capacity: u32) -> Self {
        debug_assert!(capacity > 0, "truck capacity must be positive");
        Self {
            capacity,
            state: Mutex::new(TruckState {
                loaded: Vec::new(),
                actual: 0,
            }),
            full_lamp: Lamp::new(),
            truckloads: AtomicU64::new(0),
            overload_seen: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Mass currently on board.
    pub fn loaded_weight(&self) -> u32 {
        let state = self.state.lock().expect("truck mutex poisoned");
        state.actual
    }

    pub fn loaded_count(&self) -> u32 {
        let state = self.state.lock().expect("truck mutex poisoned");
        state.loaded.len() as u32
    }

    pub fn is_full(&self) -> bool {
        self.loaded_weight() == self.capacity
    }

    /// Transient "truck became full" lamp.
    pub fn full_lamp(&self) -> &Lamp {
        &self.full_lamp
    }

    /// Completed unload cycles since construction.
    pub fn truckloads(&self) -> u64 {
        self.truckloads.load(Ordering::SeqCst)
    }

    /// Whether a load ever tripped the overload invariant.
    pub fn overload_seen(&self) -> bool {
        self.overload_seen.load(Ordering::SeqCst)
    }

    /// Put one brick on board. Fails without side effects if the brick
    /// would push the load past capacity.
    pub fn load(&self, brick: Brick) -> Result<(), OverloadError> {
        let mut state = self.state.lock().expect("truck mutex poisoned");
        if state.actual + brick.mass > self.capacity {
            self.overload_seen.store(true, Ordering::SeqCst);
            return Err(OverloadError {
                attempted: brick.mass,
                loaded: state.actual,
                capacity: self.capacity,
            });
        }
        state.actual += brick.mass;
        state.loaded.push(brick);
        Ok(())
    }

    /// Drop the load, zero the on-board mass, and reset the belt. The belt
    /// reset wakes the rendezvous so producer-side observers see the
    /// restored ceilings.
    pub fn unload(&self, belt: &Belt) -> u32 {
        let dropped = {
            let mut state = self.state.lock().expect("truck mutex poisoned");
            let dropped = state.actual;
            state.loaded.clear();
            state.actual = 0;
            dropped
        };
        self.truckloads.fetch_add(1, Ordering::SeqCst);
        info!("truck: unloaded {dropped} mass");
        belt.reset();
        dropped
    }

    /// Consumer loop: rendezvous on the full belt, drain, load with pacing,
    /// and unload once exactly full. An overload terminates this loop only;
    /// cancellation exits cleanly at any suspension point.
    pub fn run(&self, belt: &Belt, stop: &StopSignal, timing: &Timing) {
        while !stop.is_stopped() {
            if belt.wait_for_full(stop).is_err() {
                break;
            }
            let bricks = belt.take_for_transfer(self.capacity);
            let mut interrupted = false;
            for brick in bricks {
                if stop.is_stopped() {
                    interrupted = true;
                    break;
                }
                if let Err(err) = self.load(brick) {
                    error!("truck: invariant violation: {err}");
                    return;
                }
                if !timing.load_pacing.is_zero()
                    && !stop.sleep_interruptible(timing.load_pacing)
                {
                    interrupted = true;
                    break;
                }
            }
            if interrupted {
                break;
            }
            info!(
                "truck: at {}/{} ({} bricks)",
                self.loaded_weight(),
                self.capacity,
                self.loaded_count(),
            );
            if self.is_full() {
                self.full_lamp.trigger(timing.full_lamp_hold);
                if !stop.sleep_interruptible(timing.dock_delay) {
                    break;
                }
                self.unload(belt);
            }
        }
    }
}
