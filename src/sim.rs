//! Demo and benchmark runners wiring workers, belt, and truck together.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::info;

use crate::belt::Belt;
use crate::cancel::StopSignal;
use crate::config::{SimConfig, WorkerConfig};
use crate::truck::Truck;
use crate::types::Timing;
use crate::worker::Worker;

/// Polling interval while waiting for benchmark truckloads.
const BENCH_POLL_MS: u64 = 5;
/// Worker idle interval under benchmark timing.
const BENCH_WORKER_INTERVAL_MS: u64 = 1;
/// Upper bound per benchmark unload cycle before giving up.
const BENCH_CYCLE_MAX_WAIT_MS: u64 = 10_000;

/// The reference scenario from the original installation: belt of 15 bricks
/// or 29 mass units, a 73-unit truck, and three workers of masses 1..=3.
pub fn default_scenario() -> SimConfig {
    SimConfig {
        belt_count_max: 15,
        belt_weight_max: 29,
        truck_capacity: 73,
        workers: vec![
            WorkerConfig {
                brick_mass: 1,
                interval_ms: 2000,
            },
            WorkerConfig {
                brick_mass: 2,
                interval_ms: 2000,
            },
            WorkerConfig {
                brick_mass: 3,
                interval_ms: 2000,
            },
        ],
    }
}

struct Actors {
    belt: Arc<Belt>,
    truck: Arc<Truck>,
    workers: Vec<Arc<Worker>>,
    stop: Arc<StopSignal>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl Actors {
    /// Build the belt, truck, and workers from a validated config and spawn
    /// one named thread per actor.
    fn spawn(config: &SimConfig, timing: Timing) -> Self {
        let belt = Arc::new(Belt::new(
            config.belt_count_max,
            config.belt_weight_max,
            config.truck_capacity,
            timing,
        ));
        let truck = Arc::new(Truck::new(config.truck_capacity));
        let stop = Arc::new(StopSignal::new());
        let mut workers = Vec::new();
        let mut handles = Vec::new();

        for (id, worker_config) in config.workers.iter().enumerate() {
            let worker = Arc::new(Worker::new(
                id,
                worker_config.brick_mass,
                worker_config.interval_ms,
            ));
            workers.push(Arc::clone(&worker));
            let belt = Arc::clone(&belt);
            let stop = Arc::clone(&stop);
            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker.run(&belt, &stop, &timing))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        {
            let truck = Arc::clone(&truck);
            let belt = Arc::clone(&belt);
            let stop = Arc::clone(&stop);
            let handle = thread::Builder::new()
                .name("truck".to_string())
                .spawn(move || truck.run(&belt, &stop, &timing))
                .expect("failed to spawn truck thread");
            handles.push(handle);
        }

        Self {
            belt,
            truck,
            workers,
            stop,
            handles,
        }
    }

    fn stop_and_join(self) -> (Arc<Belt>, Arc<Truck>, Vec<Arc<Worker>>) {
        self.stop.stop();
        for handle in self.handles {
            handle.join().expect("actor thread panicked");
        }
        (self.belt, self.truck, self.workers)
    }
}

/// Block until the truck completes `target` unloads or `max_wait` elapses.
fn wait_for_truckloads(truck: &Truck, target: u64, max_wait: Duration) -> bool {
    let poll = Duration::from_millis(BENCH_POLL_MS);
    let start = Instant::now();
    loop {
        if truck.truckloads() >= target {
            return true;
        }
        if start.elapsed() >= max_wait {
            return false;
        }
        thread::sleep(poll);
    }
}

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    use libc::{RUSAGE_SELF, getrusage, rusage};
    // SAFETY: rusage is plain data; getrusage fills every field we read.
    let mut usage: rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { getrusage(RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let user = usage.ru_utime.tv_sec as f64 + (usage.ru_utime.tv_usec as f64 / 1_000_000.0);
    let sys = usage.ru_stime.tv_sec as f64 + (usage.ru_stime.tv_usec as f64 / 1_000_000.0);
    Some((user, sys))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Sampling interval for the demo's status observer.
const OBSERVER_POLL_MS: u64 = 500;

/// Stand-in for the excluded presentation layer: periodically samples the
/// snapshot getters and lamps and logs one status line.
fn spawn_observer(
    belt: Arc<Belt>,
    truck: Arc<Truck>,
    workers: Vec<Arc<Worker>>,
    stop: Arc<StopSignal>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("observer".to_string())
        .spawn(move || {
            while stop.sleep_interruptible(Duration::from_millis(OBSERVER_POLL_MS)) {
                let added: Vec<bool> = workers.iter().map(|w| w.added_lamp().is_lit()).collect();
                info!(
                    "status: belt {}/{} bricks {}/{} mass full={} lamp={} sent={} | truck {}/{} lamp={} | added={added:?}",
                    belt.brick_count(),
                    belt.count_max(),
                    belt.brick_weight(),
                    belt.weight_limit(),
                    belt.is_full(),
                    belt.full_lamp().is_lit(),
                    belt.cumulative_sent(),
                    truck.loaded_weight(),
                    truck.capacity(),
                    truck.full_lamp().is_lit(),
                );
                let masses: Vec<u32> = belt.bricks_snapshot().iter().map(|b| b.mass).collect();
                log::debug!("status: queue={masses:?}");
            }
        })
        .expect("failed to spawn observer thread")
}

/// Run the reference-timing demo for a bounded wall-clock duration and
/// print a summary.
pub fn run_demo(config: &SimConfig, run_secs: u64) {
    if let Err(err) = config.validate() {
        eprintln!("demo error: {err}");
        return;
    }
    info!(
        "demo: {} workers, belt {}x{}, truck {}",
        config.workers.len(),
        config.belt_count_max,
        config.belt_weight_max,
        config.truck_capacity,
    );

    let actors = Actors::spawn(config, Timing::reference());
    let observer = spawn_observer(
        Arc::clone(&actors.belt),
        Arc::clone(&actors.truck),
        actors.workers.iter().map(Arc::clone).collect(),
        Arc::clone(&actors.stop),
    );
    thread::sleep(Duration::from_secs(run_secs));
    let (belt, truck, workers) = actors.stop_and_join();
    observer.join().expect("observer thread panicked");

    let produced: Vec<u64> = workers.iter().map(|w| w.produced()).collect();
    let added_pulses: Vec<u64> = workers
        .iter()
        .map(|w| w.added_lamp().pulse_count())
        .collect();
    println!("DEMO SUMMARY");
    println!("workers={} run_secs={run_secs}", workers.len());
    println!("bricks_produced_per_worker={produced:?}");
    println!("added_pulses_per_worker={added_pulses:?}");
    println!("truckloads_completed={}", truck.truckloads());
    println!(
        "truck_load_end={}/{} full_pulses={}",
        truck.loaded_weight(),
        truck.capacity(),
        truck.full_lamp().pulse_count()
    );
    println!(
        "belt_end count={}/{} weight={}/{} full_pulses={}",
        belt.brick_count(),
        belt.count_max(),
        belt.brick_weight(),
        belt.weight_limit(),
        belt.full_lamp().pulse_count()
    );
    println!("overload_violation={}", truck.overload_seen());
}

/// Aggregated metrics from a single benchmark run.
struct BenchResult {
    workers: usize,
    cycles_target: u64,
    cycles_done: u64,
    count_max: u32,
    weight_max: u32,
    capacity: u32,
    elapsed_ms: f64,
    throughput_loads_per_s: f64,
    mass_delivered: u64,
    leftover_bricks: u32,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
    overload: bool,
}

fn benchmark_once(
    cycles: u64,
    workers: usize,
    count_max: u32,
    weight_max: u32,
    capacity: u32,
) -> BenchResult {
    debug_assert!(cycles > 0, "cycles must be > 0");
    debug_assert!(workers > 0, "workers must be > 0");
    // Worker masses cycle 1..=3 so a unit-mass producer always exists and
    // any renegotiated ceiling can be filled exactly.
    let config = SimConfig {
        belt_count_max: count_max,
        belt_weight_max: weight_max,
        truck_capacity: capacity,
        workers: (0..workers)
            .map(|id| WorkerConfig {
                brick_mass: (id as u32 % 3) + 1,
                interval_ms: BENCH_WORKER_INTERVAL_MS,
            })
            .collect(),
    };
    config.validate().expect("benchmark config invalid");

    let cpu_start = cpu_times_seconds();
    let start = Instant::now();
    let actors = Actors::spawn(&config, Timing::fast());
    let max_wait = Duration::from_millis(BENCH_CYCLE_MAX_WAIT_MS.saturating_mul(cycles));
    let finished = wait_for_truckloads(&actors.truck, cycles, max_wait);
    let (belt, truck, _workers) = actors.stop_and_join();
    let elapsed_ms = start.elapsed().as_millis() as f64;

    if !finished {
        eprintln!("# warning,benchmark_timed_out_after_ms,{elapsed_ms:.0}");
    }

    let cycles_done = truck.truckloads();
    let throughput = if elapsed_ms > 0.0 {
        cycles_done as f64 / (elapsed_ms / 1000.0)
    } else {
        0.0
    };
    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    BenchResult {
        workers,
        cycles_target: cycles,
        cycles_done,
        count_max,
        weight_max,
        capacity,
        elapsed_ms,
        throughput_loads_per_s: throughput,
        // Every completed unload delivers exactly the truck capacity.
        mass_delivered: cycles_done * capacity as u64,
        leftover_bricks: belt.brick_count(),
        cpu_user_s,
        cpu_sys_s,
        overload: truck.overload_seen(),
    }
}

/// Run one fast-timing benchmark and print CSV output for scripted
/// consumers.
pub fn run_benchmark(
    cycles: Option<u64>,
    workers: Option<usize>,
    count_max: Option<u32>,
    weight_max: Option<u32>,
    capacity: Option<u32>,
) {
    let cycles = cycles.unwrap_or(3);
    let workers = workers.unwrap_or(3);
    let count_max = count_max.unwrap_or(15);
    let weight_max = weight_max.unwrap_or(29);
    let capacity = capacity.unwrap_or(73);
    if cycles == 0 {
        eprintln!("benchmark error: cycles must be > 0");
        return;
    }
    if workers == 0 {
        eprintln!("benchmark error: workers must be > 0");
        return;
    }
    if count_max == 0 || weight_max == 0 || capacity == 0 {
        eprintln!("benchmark error: ceilings and capacity must be > 0");
        return;
    }

    let result = benchmark_once(cycles, workers, count_max, weight_max, capacity);

    println!(
        "workers,cycles_target,cycles_done,count_max,weight_max,capacity,elapsed_ms,throughput_loads_per_s,mass_delivered,leftover_bricks,cpu_user_s,cpu_sys_s,overload"
    );
    let cpu_user = result
        .cpu_user_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    let cpu_sys = result
        .cpu_sys_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    println!(
        "{},{},{},{},{},{},{:.2},{:.2},{},{},{},{},{}",
        result.workers,
        result.cycles_target,
        result.cycles_done,
        result.count_max,
        result.weight_max,
        result.capacity,
        result.elapsed_ms,
        result.throughput_loads_per_s,
        result.mass_delivered,
        result.leftover_bricks,
        cpu_user,
        cpu_sys,
        result.overload
    );
}
