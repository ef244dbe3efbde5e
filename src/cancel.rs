//! Cooperative cancellation token checked at every suspension point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Granularity at which long sleeps re-check the stop flag.
const POLL_SLICE: Duration = Duration::from_millis(25);

/// Marker returned by blocking operations that were interrupted by a stop
/// request. Cancellation is a normal termination path, not a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stopped;

/// Shared stop flag for worker and truck loops. Once stopped it stays
/// stopped; there is no rearm.
pub struct StopSignal {
    stopped: AtomicBool,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for up to `total`, waking early on stop. Returns `false` if the
    /// sleep was cut short by a stop request.
    pub fn sleep_interruptible(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if self.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(POLL_SLICE.min(deadline - now));
        }
    }
}
