//! Dual-resource admission gate: a count pool and a weight pool granted as
//! one unit per brick.
//!
//! The gate is plain data; the belt serializes access to it under its own
//! mutex. Keeping it lock-free here makes the bookkeeping directly testable.

/// Tracks two correlated permit pools plus the authoritative weight ceiling.
///
/// The ceiling is carried separately from the weight pool because the
/// consumer lowers it mid-run; between that renegotiation and the next
/// drain, the raw pool counter can lag the ceiling, so `try_admit` checks
/// both.
#[derive(Debug)]
pub struct DualResourceGate {
    count_max: u32,
    weight_max0: u32,
    weight_limit: u32,
    available_count: u32,
    available_weight: u32,
    current_count: u32,
    current_weight: u32,
}

impl DualResourceGate {
    pub fn new(count_max: u32, weight_max: u32) -> Self {
        debug_assert!(count_max > 0, "count ceiling must be positive");
        debug_assert!(weight_max > 0, "weight ceiling must be positive");
        Self {
            count_max,
            weight_max0: weight_max,
            weight_limit: weight_max,
            available_count: count_max,
            available_weight: weight_max,
            current_count: 0,
            current_weight: 0,
        }
    }

    /// Admit one brick of weight `mass` if a count slot, enough weight
    /// permits, and the ceiling all allow it. Mutates both pools together or
    /// not at all.
    pub fn try_admit(&mut self, mass: u32) -> bool {
        if self.available_count >= 1
            && self.available_weight >= mass
            && self.current_weight + mass <= self.weight_limit
        {
            self.available_count -= 1;
            self.available_weight -= mass;
            self.current_count += 1;
            self.current_weight += mass;
            true
        } else {
            false
        }
    }

    /// Return permits to both pools.
    pub fn release(&mut self, count_units: u32, weight_units: u32) {
        self.available_count += count_units;
        self.available_weight += weight_units;
        debug_assert!(
            self.available_count <= self.count_max,
            "count pool released past its ceiling"
        );
    }

    /// Lower the weight ceiling to `new_limit`, draining the pool so its
    /// available permits match. Under correct bookkeeping the pool holds at
    /// least `new_limit` permits when this is called.
    pub fn constrain_weight(&mut self, new_limit: u32) {
        debug_assert!(
            self.available_weight == 0 || self.available_weight >= new_limit,
            "weight pool below renegotiated ceiling"
        );
        if self.available_weight != 0 {
            let drain = self.available_weight.saturating_sub(new_limit);
            self.available_weight -= drain;
        }
        self.weight_limit = new_limit;
    }

    /// Restore both pools to the original ceilings and zero the counters.
    /// Release amounts are computed from what is outstanding, so calling
    /// this on an already-restored gate is a no-op.
    pub fn restore(&mut self) {
        let count_due = self.count_max - self.available_count.min(self.count_max);
        if count_due > 0 {
            self.available_count += count_due;
        }
        let weight_due = self.weight_max0 - self.available_weight.min(self.weight_max0);
        if weight_due > 0 {
            self.available_weight += weight_due;
        }
        self.current_count = 0;
        self.current_weight = 0;
        self.weight_limit = self.weight_max0;
    }

    /// True once either pool has no permits left.
    pub fn is_exhausted(&self) -> bool {
        self.available_count == 0 || self.available_weight == 0
    }

    /// Subtract drained weight from the current tally (queue side only; the
    /// pools are settled separately by the full/drain handoff).
    pub fn remove_weight(&mut self, total: u32) {
        debug_assert!(total <= self.current_weight, "drained more than admitted");
        self.current_weight = self.current_weight.saturating_sub(total);
    }

    /// Zero the admitted-count tally after a drain handoff.
    pub fn clear_count(&mut self) {
        self.current_count = 0;
    }

    pub fn count_max(&self) -> u32 {
        self.count_max
    }

    pub fn weight_limit(&self) -> u32 {
        self.weight_limit
    }

    pub fn current_count(&self) -> u32 {
        self.current_count
    }

    pub fn current_weight(&self) -> u32 {
        self.current_weight
    }

    pub fn available_count(&self) -> u32 {
        self.available_count
    }

    pub fn available_weight(&self) -> u32 {
        self.available_weight
    }
}
