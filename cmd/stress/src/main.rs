//! Stress test - many completion elements
//!
//! Spawns a large number of completion elements onto one list and drives
//! them with pinned carriers until every body has run to completion.
//!
//! # Environment Variables
//!
//! - `UMS_LOG_LEVEL`: error, warn, info (default), debug, trace
//! - `UMS_FLUSH_EPRINT`: set to 1 to flush after every log line

// UMS_LOG_LEVEL=warn cargo run --release -p umsched-stress -- 1024

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use umsched::{kinfo, ListId, SchedId, Ums, UmsConfig, UmsHandle};

fn dispatch(h: UmsHandle, list: ListId) -> impl Fn(SchedId) -> i32 + Send + Sync + 'static {
    move |_sched| {
        loop {
            let ids = match h.reserve(list, 4) {
                Ok(ids) => ids,
                // List torn down, this carrier is done.
                Err(_) => return 0,
            };
            if h.exec(ids[0]).is_err() {
                return 0;
            }
        }
    }
}

fn main() {
    println!("=== UMS Stress Test ===\n");
    umsched::init_logging();

    let num_elements: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(512);
    let yields_each: u64 = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    println!("Spawning {} elements, {} yields each...", num_elements, yields_each);

    let config = UmsConfig::default()
        .num_cpus(4)
        .max_contexts(num_elements + 64);

    let ums = Ums::new(config).expect("runtime init failed");
    let list = ums.create_completion_list().expect("list creation failed");

    let yields_done = Arc::new(AtomicU64::new(0));

    let start = Instant::now();
    for i in 0..num_elements {
        let h = ums.handle();
        let yields_done = yields_done.clone();

        ums.create_completion_element(list, move |_me| {
            for _ in 0..yields_each {
                if h.yield_now().is_err() {
                    return -1;
                }
                yields_done.fetch_add(1, Ordering::Relaxed);
            }
            0
        })
        .expect("element creation failed");

        // Progress indicator
        if (i + 1) % 100 == 0 {
            print!("\rSpawned: {}/{}", i + 1, num_elements);
        }
    }

    let spawn_time = start.elapsed();
    println!("\n\nSpawn time: {:?}", spawn_time);
    println!(
        "Spawn rate: {:.0} elements/sec",
        num_elements as f64 / spawn_time.as_secs_f64()
    );

    println!("\nDispatching...");
    let run_start = Instant::now();
    ums.enter_scheduling_mode(dispatch(ums.handle(), list), list)
        .expect("scheduler start failed");

    let statuses = ums.wait_children();
    kinfo!("all children joined");

    let total_time = start.elapsed();
    let run_time = run_start.elapsed();
    let yields = yields_done.load(Ordering::Relaxed);
    let failed = statuses.iter().filter(|&&s| s < 0).count();

    println!("\n=== Results ===");
    println!("Total elements:  {}", num_elements);
    println!("Yields done:     {}", yields);
    println!("Failed children: {}", failed);
    println!("Spawn time:      {:?}", spawn_time);
    println!("Run time:        {:?}", run_time);
    println!("Total time:      {:?}", total_time);
    println!(
        "Throughput:      {:.0} yields/sec",
        yields as f64 / run_time.as_secs_f64()
    );
    println!("Contexts live:   {}", ums.handle().contexts_live());

    println!("\n=== Stress Test Complete ===");
}
