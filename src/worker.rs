//! Producer loop: one worker repeatedly admits a fixed-mass brick, pulses
//! its "added" lamp, and idles for its configured interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::debug;

use crate::belt::Belt;
use crate::cancel::StopSignal;
use crate::signals::Lamp;
use crate::types::{Timing, WorkerId};

pub struct Worker {
    id: WorkerId,
    brick_mass: u32,
    interval: Duration,
    added_lamp: Lamp,
    produced: AtomicU64,
}

impl Worker {
    pub fn new(id: WorkerId, brick_mass: u32, interval_ms: u64) -> Self {
        debug_assert!(brick_mass > 0, "brick mass must be positive");
        Self {
            id,
            brick_mass,
            interval: Duration::from_millis(interval_ms),
            added_lamp: Lamp::new(),
            produced: AtomicU64::new(0),
        }
    }

    /// Transient "worker added a brick" lamp.
    pub fn added_lamp(&self) -> &Lamp {
        &self.added_lamp
    }

    /// Bricks successfully admitted since construction.
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }

    /// Producer loop. Exits promptly on stop, including while blocked in
    /// the belt's admission retry loop or the idle interval.
    pub fn run(&self, belt: &Belt, stop: &StopSignal, timing: &Timing) {
        while !stop.is_stopped() {
            if belt.add(self.brick_mass, stop).is_err() {
                break;
            }
            self.produced.fetch_add(1, Ordering::SeqCst);
            self.added_lamp.trigger(timing.added_lamp_hold);
            debug!("worker-{}: added brick of mass {}", self.id, self.brick_mass);
            if !stop.sleep_interruptible(self.interval) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn worker_produces_until_stopped() {
        let belt = Arc::new(Belt::new(100, 1000, 10_000, Timing::fast()));
        let worker = Arc::new(Worker::new(0, 2, 1));
        let stop = Arc::new(StopSignal::new());

        let handle = {
            let belt = Arc::clone(&belt);
            let worker = Arc::clone(&worker);
            let stop = Arc::clone(&stop);
            thread::spawn(move || worker.run(&belt, &stop, &Timing::fast()))
        };

        thread::sleep(Duration::from_millis(50));
        stop.stop();
        handle.join().expect("worker thread panicked");

        let produced = worker.produced();
        assert!(produced > 0, "worker never produced");
        assert_eq!(belt.brick_weight(), produced as u32 * 2);
        assert!(worker.added_lamp().pulse_count() >= produced);
    }

    #[test]
    fn worker_blocked_on_full_belt_stops_promptly() {
        // Count ceiling of one: the second add can never succeed.
        let belt = Arc::new(Belt::new(1, 100, 10_000, Timing::fast()));
        let worker = Arc::new(Worker::new(0, 1, 1));
        let stop = Arc::new(StopSignal::new());

        let handle = {
            let belt = Arc::clone(&belt);
            let worker = Arc::clone(&worker);
            let stop = Arc::clone(&stop);
            thread::spawn(move || worker.run(&belt, &stop, &Timing::fast()))
        };

        // Let the worker admit its first brick and block on the second.
        thread::sleep(Duration::from_millis(40));
        stop.stop();
        handle.join().expect("blocked worker did not stop");

        assert_eq!(belt.brick_count(), 1);
        assert_eq!(worker.produced(), 1);
    }
}
