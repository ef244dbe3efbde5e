//! Construction-time parameters for the belt, truck, and workers.
//!
//! The core rejects invalid values here and supplies no defaults; default
//! substitution belongs to the CLI layer.

use thiserror::Error;

/// Per-worker production parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Mass of every brick this worker produces.
    pub brick_mass: u32,
    /// Idle time between successful admissions, in milliseconds.
    pub interval_ms: u64,
}

/// Full scenario parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// Maximum number of bricks on the belt.
    pub belt_count_max: u32,
    /// Initial maximum total mass on the belt.
    pub belt_weight_max: u32,
    /// Total mass the truck accepts before unloading.
    pub truck_capacity: u32,
    /// One entry per producer.
    pub workers: Vec<WorkerConfig>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be positive")]
    NonPositive { field: &'static str },
    #[error("worker {index}: {field} must be positive")]
    NonPositiveWorker { index: usize, field: &'static str },
    #[error("at least one worker is required")]
    NoWorkers,
}

impl SimConfig {
    /// Reject zero-valued ceilings, capacities, masses, and intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.belt_count_max == 0 {
            return Err(ConfigError::NonPositive {
                field: "belt count ceiling",
            });
        }
        if self.belt_weight_max == 0 {
            return Err(ConfigError::NonPositive {
                field: "belt weight ceiling",
            });
        }
        if self.truck_capacity == 0 {
            return Err(ConfigError::NonPositive {
                field: "truck capacity",
            });
        }
        if self.workers.is_empty() {
            return Err(ConfigError::NoWorkers);
        }
        for (index, worker) in self.workers.iter().enumerate() {
            if worker.brick_mass == 0 {
                return Err(ConfigError::NonPositiveWorker {
                    index,
                    field: "brick mass",
                });
            }
            if worker.interval_ms == 0 {
                return Err(ConfigError::NonPositiveWorker {
                    index,
                    field: "interval",
                });
            }
        }
        Ok(())
    }
}
