mod belt;
mod cancel;
mod config;
mod gate;
mod signals;
mod sim;
mod truck;
mod types;
mod worker;

/// Demo wall-clock duration when none is given; long enough for the
/// reference scenario to complete at least one unload cycle.
const DEFAULT_DEMO_SECS: u64 = 45;

fn parse_positive_u64(arg: &str) -> Option<u64> {
    arg.trim().parse::<u64>().ok().filter(|&value| value > 0)
}

fn print_usage(program: &str) {
    println!("Brick Belt CLI");
    println!("Usage:");
    println!("  {program} (run demo with reference parameters)");
    println!("  {program} demo [secs]");
    println!("  {program} bench [cycles] [workers] [count_max] [weight_max] [capacity]");
    println!("  {program} --help");
    println!();
    println!("All numeric arguments must be positive.");
    println!("Defaults:");
    println!("  demo   secs={DEFAULT_DEMO_SECS}");
    println!("  bench  cycles=3 workers=3 count_max=15 weight_max=29 capacity=73");
}

fn exit_with_usage(program: &str, message: &str) -> ! {
    eprintln!("{message}");
    print_usage(program);
    std::process::exit(2);
}

fn main() {
    env_logger::init();
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "brick_belt".to_string());
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("demo") => {
            let secs = match args.next() {
                None => DEFAULT_DEMO_SECS,
                Some(arg) => parse_positive_u64(&arg).unwrap_or_else(|| {
                    exit_with_usage(&program, &format!("demo: invalid secs value: {arg}"))
                }),
            };
            if let Some(extra) = args.next() {
                exit_with_usage(&program, &format!("demo: unexpected argument: {extra}"));
            }
            sim::run_demo(&sim::default_scenario(), secs);
        }
        Some("bench") => {
            let mut values = Vec::new();
            for arg in args {
                let value = parse_positive_u64(&arg).unwrap_or_else(|| {
                    exit_with_usage(&program, &format!("bench: invalid argument: {arg}"))
                });
                values.push(value);
            }
            if values.len() > 5 {
                exit_with_usage(&program, "bench: too many arguments");
            }
            let as_u32 = |value: &u64| u32::try_from(*value).ok();
            let cycles = values.first().copied();
            let workers = values.get(1).map(|&v| v as usize);
            let count_max = values.get(2).and_then(as_u32);
            let weight_max = values.get(3).and_then(as_u32);
            let capacity = values.get(4).and_then(as_u32);
            if values.len() > 2 && count_max.is_none()
                || values.len() > 3 && weight_max.is_none()
                || values.len() > 4 && capacity.is_none()
            {
                exit_with_usage(&program, "bench: ceiling or capacity out of range");
            }
            sim::run_benchmark(cycles, workers, count_max, weight_max, capacity);
        }
        Some("--help") | Some("-h") | Some("help") => print_usage(&program),
        Some(other) => {
            exit_with_usage(&program, &format!("unknown command: {other}"));
        }
        None => sim::run_demo(&sim::default_scenario(), DEFAULT_DEMO_SECS),
    }
}
