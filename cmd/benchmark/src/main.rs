//! Benchmark suite for umsched
//!
//! Measures the cost of the core scheduling operations. The yield
//! benchmark times the full round trip of a completion element leaving
//! the carrier, being re-reserved and being switched back in.
//!
//! # Environment Variables
//!
//! - `UMS_LOG_LEVEL`: error, warn, info (default), debug, trace
//! - `UMS_FLUSH_EPRINT`: set to 1 to flush after every log line

// UMS_LOG_LEVEL=warn cargo run --release -p umsched-benchmark

use std::time::Instant;

use umsched::{ListId, SchedId, Ums, UmsConfig, UmsHandle};

fn dispatch(h: UmsHandle, list: ListId) -> impl Fn(SchedId) -> i32 + Send + Sync + 'static {
    move |_sched| {
        loop {
            let ids = match h.reserve(list, 1) {
                Ok(ids) => ids,
                Err(_) => return 0,
            };
            if h.exec(ids[0]).is_err() {
                return 0;
            }
        }
    }
}

fn main() {
    println!("=== UMS Benchmarks ===\n");
    umsched::init_logging();

    let rounds: u32 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);

    bench_yield_roundtrip(rounds);
    bench_spawn_teardown();

    println!("\n=== Benchmarks Complete ===");
}

fn bench_yield_roundtrip(rounds: u32) {
    println!("Benchmark: Yield round trip");
    println!("{}", "─".repeat(40));

    let config = UmsConfig::default().num_cpus(1);
    let ums = Ums::new(config).expect("runtime init failed");
    let list = ums.create_completion_list().expect("list creation failed");

    let h = ums.handle();
    ums.create_completion_element(list, move |_me| {
        let mut total_ns: u128 = 0;
        let mut min_ns = u128::MAX;
        let mut max_ns = 0u128;

        for _ in 0..rounds {
            let t0 = Instant::now();
            if h.yield_now().is_err() {
                return -1;
            }
            let ns = t0.elapsed().as_nanos();
            total_ns += ns;
            min_ns = min_ns.min(ns);
            max_ns = max_ns.max(ns);
        }

        println!("  Iterations:  {}", rounds);
        println!(
            "  Min/avg/max: {} / {:.0} / {} ns",
            min_ns,
            total_ns as f64 / rounds as f64,
            max_ns
        );
        println!(
            "  Rate:        {:.0} yields/sec",
            rounds as f64 / (total_ns as f64 / 1e9)
        );
        0
    })
    .expect("element creation failed");

    // Two schedulers contend for the same list.
    ums.enter_scheduling_mode(dispatch(ums.handle(), list), list)
        .expect("scheduler start failed");
    ums.enter_scheduling_mode(dispatch(ums.handle(), list), list)
        .expect("scheduler start failed");

    let statuses = ums.wait_children();
    let failed = statuses.iter().filter(|&&s| s < 0).count();
    println!("  Failures:    {}\n", failed);
}

fn bench_spawn_teardown() {
    println!("Benchmark: Spawn + teardown");
    println!("{}", "─".repeat(40));

    let iterations = 256usize;
    let config = UmsConfig::default()
        .num_cpus(1)
        .max_contexts(iterations + 16);
    let ums = Ums::new(config).expect("runtime init failed");
    let list = ums.create_completion_list().expect("list creation failed");

    let start = Instant::now();
    for _ in 0..iterations {
        ums.create_completion_element(list, |_me| 0)
            .expect("element creation failed");
    }
    ums.enter_scheduling_mode(dispatch(ums.handle(), list), list)
        .expect("scheduler start failed");
    let statuses = ums.wait_children();
    let elapsed = start.elapsed();

    let per_elem_us = elapsed.as_nanos() as f64 / iterations as f64 / 1_000.0;
    let failed = statuses.iter().filter(|&&s| s < 0).count();
    println!("  Iterations:  {}", iterations);
    println!("  Total time:  {:?}", elapsed);
    println!("  Per element: {:.1} us", per_elem_us);
    println!(
        "  Rate:        {:.0}/sec",
        iterations as f64 / elapsed.as_secs_f64()
    );
    println!("  Failures:    {}\n", failed);
}
