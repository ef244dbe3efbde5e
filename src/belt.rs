//! The conveyor belt: a FIFO buffer bounded by brick count and total mass
//! at the same time, with a full-state rendezvous toward the single truck.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use log::{debug, info};

use crate::cancel::{StopSignal, Stopped};
use crate::gate::DualResourceGate;
use crate::signals::Lamp;
use crate::types::{Brick, Timing};

/// Slice length for rendezvous waits so a stop request is honored promptly.
const RENDEZVOUS_SLICE: Duration = Duration::from_millis(25);

struct BeltState {
    queue: VecDeque<Brick>,
    gate: DualResourceGate,
    /// Total mass ever admitted since the last reset; sizes the next
    /// weight-ceiling renegotiation.
    cumulative_sent: u32,
    full: bool,
}

pub struct Belt {
    state: Mutex<BeltState>,
    rendezvous: Condvar,
    /// Mirror of the full flag for lock-free observation by the UI layer.
    full_flag: AtomicBool,
    full_lamp: Lamp,
    truck_capacity: u32,
    timing: Timing,
}

impl Belt {
    pub fn new(count_max: u32, weight_max: u32, truck_capacity: u32, timing: Timing) -> Self {
        Self {
            state: Mutex::new(BeltState {
                queue: VecDeque::new(),
                gate: DualResourceGate::new(count_max, weight_max),
                cumulative_sent: 0,
                full: false,
            }),
            rendezvous: Condvar::new(),
            full_flag: AtomicBool::new(false),
            full_lamp: Lamp::new(),
            truck_capacity,
            timing,
        }
    }

    /// Blocking admission used by workers. Polls the gate every retry
    /// interval because the weight ceiling can drop independently of any
    /// release event. The stop signal is checked at every retry boundary,
    /// and cancellation never leaves a brick half-admitted.
    pub fn add(&self, mass: u32, stop: &StopSignal) -> Result<(), Stopped> {
        loop {
            if stop.is_stopped() {
                return Err(Stopped);
            }
            {
                let mut state = self.state.lock().expect("belt mutex poisoned");
                if state.gate.try_admit(mass) {
                    state.queue.push_back(Brick::new(mass));
                    state.cumulative_sent += mass;
                    debug!(
                        "belt: added brick {}/{} (+{mass}) count={} pools=({},{})",
                        state.gate.current_weight(),
                        state.gate.weight_limit(),
                        state.gate.current_count(),
                        state.gate.available_count(),
                        state.gate.available_weight(),
                    );
                    if state.gate.is_exhausted() {
                        state.full = true;
                        self.full_flag.store(true, Ordering::Release);
                        info!(
                            "belt: full at count={} weight={}",
                            state.gate.current_count(),
                            state.gate.current_weight(),
                        );
                        // Exactly one consumer waits on the rendezvous.
                        self.rendezvous.notify_one();
                    }
                    return Ok(());
                }
            }
            if !stop.sleep_interruptible(self.timing.retry_interval) {
                return Err(Stopped);
            }
        }
    }

    /// Blocking rendezvous used by the sole truck. Returns once the belt has
    /// filled, the full lamp has pulsed, and the simulated dock travel has
    /// elapsed; by then the pools are re-opened and the weight ceiling has
    /// been renegotiated against the truck's remaining capacity.
    pub fn wait_for_full(&self, stop: &StopSignal) -> Result<(), Stopped> {
        {
            let mut state = self.state.lock().expect("belt mutex poisoned");
            while !state.full {
                if stop.is_stopped() {
                    return Err(Stopped);
                }
                let (guard, _timeout) = self
                    .rendezvous
                    .wait_timeout(state, RENDEZVOUS_SLICE)
                    .expect("condvar wait failed");
                state = guard;
            }
        }

        self.full_lamp.trigger(self.timing.full_lamp_hold);
        // Truck travel to the dock. The belt stays full for the duration:
        // admission needs pool permits and both pools stay drained until the
        // handoff below.
        if !stop.sleep_interruptible(self.timing.dock_delay) {
            return Err(Stopped);
        }

        let mut state = self.state.lock().expect("belt mutex poisoned");
        state.full = false;
        self.full_flag.store(false, Ordering::Release);

        // Re-open the pools according to how the belt filled. The
        // count-filled branch takes precedence when both limits were hit at
        // once; the two release amounts coincide in that case, but the
        // ordering is kept fixed for determinism.
        let current_count = state.gate.current_count();
        let current_weight = state.gate.current_weight();
        if current_count == state.gate.count_max() {
            let count_max = state.gate.count_max();
            state.gate.release(count_max, current_weight);
        } else if current_weight == state.gate.weight_limit() {
            let weight_limit = state.gate.weight_limit();
            state.gate.release(current_count, weight_limit);
        }

        // Never admit more weight than the truck could still accept before
        // its next unload.
        let remaining = self.truck_capacity.saturating_sub(state.cumulative_sent);
        if remaining < state.gate.weight_limit() {
            state.gate.constrain_weight(remaining);
            info!("belt: weight ceiling renegotiated to {remaining}");
        }

        state.gate.clear_count();
        // Broadcast: only the truck waits today, but spurious wakes and a
        // future second consumer both need every waiter re-checked.
        self.rendezvous.notify_all();
        Ok(())
    }

    /// Greedy FIFO prefix take: removes bricks from the front while their
    /// cumulative mass stays within `max_load`. Bricks are never split or
    /// reordered.
    pub fn take_for_transfer(&self, max_load: u32) -> Vec<Brick> {
        let mut state = self.state.lock().expect("belt mutex poisoned");
        let mut taken = Vec::new();
        let mut total = 0u32;
        while let Some(brick) = state.queue.front() {
            if total + brick.mass > max_load {
                break;
            }
            total += brick.mass;
            let brick = state.queue.pop_front().expect("front observed above");
            taken.push(brick);
        }
        state.gate.remove_weight(total);
        debug!(
            "belt: transferred {} bricks ({total} mass), {} left",
            taken.len(),
            state.queue.len(),
        );
        taken
    }

    /// Restore the belt to its construction-time state: original pool
    /// ceilings, empty queue, zeroed counters. Safe to call repeatedly; the
    /// release amounts are computed from what is outstanding.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("belt mutex poisoned");
        state.gate.restore();
        state.queue.clear();
        state.cumulative_sent = 0;
        state.full = false;
        self.full_flag.store(false, Ordering::Release);
        info!("belt: reset to initial ceilings");
        self.rendezvous.notify_all();
    }

    /// Number of bricks currently queued.
    pub fn brick_count(&self) -> u32 {
        let state = self.state.lock().expect("belt mutex poisoned");
        state.queue.len() as u32
    }

    /// Total mass currently admitted.
    pub fn brick_weight(&self) -> u32 {
        let state = self.state.lock().expect("belt mutex poisoned");
        state.gate.current_weight()
    }

    pub fn count_max(&self) -> u32 {
        let state = self.state.lock().expect("belt mutex poisoned");
        state.gate.count_max()
    }

    /// Current (possibly renegotiated) weight ceiling.
    pub fn weight_limit(&self) -> u32 {
        let state = self.state.lock().expect("belt mutex poisoned");
        state.gate.weight_limit()
    }

    pub fn cumulative_sent(&self) -> u32 {
        let state = self.state.lock().expect("belt mutex poisoned");
        state.cumulative_sent
    }

    /// Lock-free view of the full flag for observers.
    pub fn is_full(&self) -> bool {
        self.full_flag.load(Ordering::Acquire)
    }

    /// Transient "belt became full" lamp.
    pub fn full_lamp(&self) -> &Lamp {
        &self.full_lamp
    }

    /// Copy of the queued bricks in belt order.
    pub fn bricks_snapshot(&self) -> Vec<Brick> {
        let state = self.state.lock().expect("belt mutex poisoned");
        state.queue.iter().copied().collect()
    }

    #[cfg(test)]
    pub(crate) fn pools_for_test(&self) -> (u32, u32) {
        let state = self.state.lock().expect("belt mutex poisoned");
        (
            state.gate.available_count(),
            state.gate.available_weight(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    fn belt(count_max: u32, weight_max: u32, truck_capacity: u32) -> Belt {
        Belt::new(count_max, weight_max, truck_capacity, Timing::fast())
    }

    #[test]
    fn admitted_weight_matches_queue_contents() {
        let belt = belt(10, 20, 1000);
        let stop = StopSignal::new();
        belt.add(3, &stop).expect("add 3");
        belt.add(4, &stop).expect("add 4");
        let snapshot = belt.bricks_snapshot();
        let queued: u32 = snapshot.iter().map(|b| b.mass).sum();
        assert_eq!(belt.brick_weight(), queued);
        assert_eq!(belt.brick_count(), 2);
        assert_eq!(belt.cumulative_sent(), 7);
        assert!(!belt.is_full());
    }

    #[test]
    fn weight_exhaustion_sets_full() {
        let belt = belt(10, 5, 1000);
        let stop = StopSignal::new();
        belt.add(2, &stop).expect("add 2");
        assert!(!belt.is_full());
        belt.add(3, &stop).expect("add 3");
        assert!(belt.is_full());
    }

    #[test]
    fn count_exhaustion_sets_full() {
        let belt = belt(2, 100, 1000);
        let stop = StopSignal::new();
        belt.add(1, &stop).expect("add");
        belt.add(1, &stop).expect("add");
        assert!(belt.is_full());
    }

    #[test]
    fn blocked_add_cancels_promptly_without_partial_admission() {
        let belt = Arc::new(belt(1, 10, 1000));
        let stop = Arc::new(StopSignal::new());
        belt.add(1, &stop).expect("first add fills the count pool");

        let (tx, rx) = mpsc::channel();
        let belt_clone = Arc::clone(&belt);
        let stop_clone = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let result = belt_clone.add(1, &stop_clone);
            tx.send(result).expect("send add result");
        });

        // Give the second add time to enter its retry loop, then stop.
        thread::sleep(Duration::from_millis(20));
        stop.stop();

        let result = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("blocked add did not observe stop");
        assert_eq!(result, Err(Stopped));
        handle.join().expect("producer thread panicked");

        assert_eq!(belt.brick_count(), 1);
        assert_eq!(belt.brick_weight(), 1);
        assert_eq!(belt.cumulative_sent(), 1);
    }

    #[test]
    fn wait_for_full_reopens_pools_count_branch() {
        let belt = belt(2, 100, 1000);
        let stop = StopSignal::new();
        belt.add(5, &stop).expect("add");
        belt.add(7, &stop).expect("add");
        assert!(belt.is_full());

        belt.wait_for_full(&stop).expect("wait on full belt");
        assert!(!belt.is_full());
        assert_eq!(belt.full_lamp().pulse_count(), 1);
        // Count-filled: the count ceiling and the admitted weight return.
        assert_eq!(belt.pools_for_test(), (2, 100));
        assert_eq!(belt.weight_limit(), 100);

        let taken = belt.take_for_transfer(1000);
        let masses: Vec<u32> = taken.iter().map(|b| b.mass).collect();
        assert_eq!(masses, vec![5, 7]);
        assert_eq!(belt.brick_weight(), 0);
    }

    #[test]
    fn wait_for_full_reopens_pools_weight_branch() {
        let belt = belt(10, 12, 1000);
        let stop = StopSignal::new();
        belt.add(5, &stop).expect("add");
        belt.add(7, &stop).expect("add");
        assert!(belt.is_full());

        belt.wait_for_full(&stop).expect("wait on full belt");
        // Weight-filled: the weight ceiling and the used count slots return.
        assert_eq!(belt.pools_for_test(), (10, 12));
    }

    #[test]
    fn wait_for_full_unblocks_when_producers_fill_the_belt() {
        let belt = Arc::new(belt(2, 100, 1000));
        let stop = Arc::new(StopSignal::new());
        let (tx, rx) = mpsc::channel();

        let belt_clone = Arc::clone(&belt);
        let stop_clone = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let result = belt_clone.wait_for_full(&stop_clone);
            tx.send(result).expect("send wait result");
        });

        let producer_stop = StopSignal::new();
        belt.add(4, &producer_stop).expect("add");
        belt.add(6, &producer_stop).expect("add");

        let result = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("wait_for_full did not unblock");
        assert_eq!(result, Ok(()));
        handle.join().expect("consumer thread panicked");
    }

    #[test]
    fn wait_for_full_cancels_on_stop() {
        let belt = Arc::new(belt(5, 50, 1000));
        let stop = Arc::new(StopSignal::new());
        let (tx, rx) = mpsc::channel();

        let belt_clone = Arc::clone(&belt);
        let stop_clone = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let result = belt_clone.wait_for_full(&stop_clone);
            tx.send(result).expect("send wait result");
        });

        thread::sleep(Duration::from_millis(20));
        stop.stop();

        let result = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("waiting consumer did not observe stop");
        assert_eq!(result, Err(Stopped));
        handle.join().expect("consumer thread panicked");
    }

    #[test]
    fn ceiling_renegotiates_against_remaining_truck_capacity() {
        let belt = belt(100, 29, 40);
        let stop = StopSignal::new();
        belt.add(14, &stop).expect("add");
        belt.add(15, &stop).expect("add");
        assert!(belt.is_full());

        belt.wait_for_full(&stop).expect("wait on full belt");
        // 40 - 29 = 11 remaining, which is below the old ceiling of 29.
        assert_eq!(belt.weight_limit(), 11);
        assert_eq!(belt.pools_for_test().1, 11);

        let taken = belt.take_for_transfer(40);
        assert_eq!(taken.len(), 2);

        // A brick over the new ceiling must keep blocking even though it
        // fit under the original one.
        let blocked_stop = Arc::new(StopSignal::new());
        let belt = Arc::new(belt);
        let (tx, rx) = mpsc::channel();
        let belt_clone = Arc::clone(&belt);
        let stop_clone = Arc::clone(&blocked_stop);
        let handle = thread::spawn(move || {
            let result = belt_clone.add(12, &stop_clone);
            tx.send(result).expect("send add result");
        });
        thread::sleep(Duration::from_millis(20));
        blocked_stop.stop();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1))
                .expect("oversized add did not observe stop"),
            Err(Stopped)
        );
        handle.join().expect("producer thread panicked");

        // A brick at exactly the new ceiling is admitted and refills it.
        belt.add(11, &stop).expect("add at new ceiling");
        assert!(belt.is_full());
        assert_eq!(belt.brick_weight(), 11);
    }

    #[test]
    fn take_for_transfer_is_a_greedy_prefix() {
        let belt = belt(10, 20, 1000);
        let stop = StopSignal::new();
        for mass in [5, 3, 4] {
            belt.add(mass, &stop).expect("add");
        }
        let before = belt.bricks_snapshot();

        let taken = belt.take_for_transfer(8);
        let masses: Vec<u32> = taken.iter().map(|b| b.mass).collect();
        assert_eq!(masses, vec![5, 3]);

        // Taken ++ remaining reconstructs the original order.
        let mut reconstructed = taken.clone();
        reconstructed.extend(belt.bricks_snapshot());
        assert_eq!(reconstructed, before);
        assert_eq!(belt.brick_weight(), 4);
    }

    #[test]
    fn take_for_transfer_stops_at_first_overflowing_brick() {
        let belt = belt(10, 20, 1000);
        let stop = StopSignal::new();
        for mass in [2, 9, 1] {
            belt.add(mass, &stop).expect("add");
        }
        // The 9 overflows a load of 3; the 1 behind it must not jump ahead.
        let taken = belt.take_for_transfer(3);
        let masses: Vec<u32> = taken.iter().map(|b| b.mass).collect();
        assert_eq!(masses, vec![2]);
        assert_eq!(belt.brick_count(), 2);
    }

    #[test]
    fn reset_is_idempotent() {
        let belt = belt(5, 9, 100);
        let stop = StopSignal::new();
        belt.add(4, &stop).expect("add");
        belt.add(3, &stop).expect("add");

        belt.reset();
        belt.reset();
        assert_eq!(belt.brick_count(), 0);
        assert_eq!(belt.brick_weight(), 0);
        assert_eq!(belt.cumulative_sent(), 0);
        assert_eq!(belt.weight_limit(), 9);
        assert_eq!(belt.pools_for_test(), (5, 9));
        assert!(!belt.is_full());
    }

    #[test]
    fn reset_restores_a_renegotiated_ceiling() {
        let belt = belt(100, 29, 40);
        let stop = StopSignal::new();
        belt.add(29, &stop).expect("add");
        belt.wait_for_full(&stop).expect("wait");
        assert_eq!(belt.weight_limit(), 11);

        belt.take_for_transfer(40);
        belt.reset();
        assert_eq!(belt.weight_limit(), 29);
        assert_eq!(belt.pools_for_test(), (100, 29));
    }

    #[test]
    fn stop_honored_within_one_retry_interval() {
        let belt = Arc::new(belt(1, 10, 1000));
        let stop = Arc::new(StopSignal::new());
        belt.add(1, &stop).expect("fill the belt");

        let belt_clone = Arc::clone(&belt);
        let stop_clone = Arc::clone(&stop);
        let handle = thread::spawn(move || belt_clone.add(1, &stop_clone));

        thread::sleep(Duration::from_millis(10));
        let requested = Instant::now();
        stop.stop();
        let result = handle.join().expect("producer thread panicked");
        // Fast timing retries every 1 ms; one poll slice bounds the exit.
        assert!(requested.elapsed() < Duration::from_millis(500));
        assert_eq!(result, Err(Stopped));
    }
}
