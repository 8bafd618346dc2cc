//! Basic user-mode scheduling example
//!
//! Sixteen completion elements mutating a shared counter, dispatched by
//! two schedulers over one completion list.
//!
//! # Environment Variables
//!
//! - `UMS_FLUSH_EPRINT=1` - Flush debug output immediately (useful for crash debugging)
//! - `UMS_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use umsched::{kinfo, ListId, SchedId, Ums, UmsConfig, UmsHandle};

// UMS_LOG_LEVEL=debug UMS_FLUSH_EPRINT=1 cargo run -p umsched-basic
fn main() {
    println!("=== UMS Basic Example ===\n");

    // Reads UMS_FLUSH_EPRINT and UMS_LOG_LEVEL env vars
    umsched::init_logging();

    let config = UmsConfig::default().num_cpus(2);
    let ums = Ums::new(config).expect("runtime init failed");

    let list = ums.create_completion_list().expect("list creation failed");
    println!("Completion list: {}", list);

    let c = Arc::new(AtomicI32::new(2));

    // Fixed op pattern over the shared counter: mult, mult, incr, decr
    for i in 0..16 {
        let c = Arc::clone(&c);
        let h = ums.handle();
        ums.create_completion_element(list, move |me| {
            println!("I am completion element {}", me);
            match i % 4 {
                0 | 1 => {
                    println!("multiplying c");
                    let _ = c.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                        Some(v.wrapping_mul(v))
                    });
                }
                2 => {
                    println!("incrementing c");
                    c.fetch_add(1, Ordering::SeqCst);
                }
                _ => {
                    println!("decrementing c");
                    c.fetch_sub(1, Ordering::SeqCst);
                }
            }
            h.yield_now().unwrap();
            c.load(Ordering::SeqCst)
        })
        .expect("element creation failed");
    }

    // Two schedulers draining the same list
    let s1 = ums
        .enter_scheduling_mode(dispatch(ums.handle(), list), list)
        .expect("scheduler 1 failed");
    let s2 = ums
        .enter_scheduling_mode(dispatch(ums.handle(), list), list)
        .expect("scheduler 2 failed");
    println!("Schedulers: {} {}", s1, s2);

    let statuses = ums.wait_children();
    kinfo!("all children joined");

    println!("\nStatuses: {:?}", statuses);
    println!("Final c: {}", c.load(Ordering::SeqCst));
    println!("\n=== Example Complete ===");
}

/// Dispatch loop shared by every carrier: take a batch of two, run the
/// first, repeat until teardown.
fn dispatch(h: UmsHandle, list: ListId) -> impl Fn(SchedId) -> i32 + Send + Sync + 'static {
    move |_sched| loop {
        let ids = match h.reserve(list, 2) {
            Ok(ids) => ids,
            Err(_) => return 0,
        };
        if h.exec(ids[0]).is_err() {
            return 0;
        }
    }
}
