//! Platform helpers
//!
//! CPU topology, carrier pinning and the wall-free monotonic clock. All
//! timestamps in the runtime are nanoseconds from `now_ns`.

use std::sync::OnceLock;
use std::time::Instant;

use umsched_core::constants::MAX_CPUS;
use umsched_core::kwarn;

static START_INSTANT: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds since the first clock use in this process
#[inline]
pub fn now_ns() -> u64 {
    START_INSTANT.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Number of CPUs usable for carrier workers, capped at MAX_CPUS
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_CPUS)
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// CPU the calling thread is currently running on
        pub fn current_cpu() -> usize {
            let cpu = unsafe { libc::sched_getcpu() };
            if cpu < 0 {
                0
            } else {
                cpu as usize
            }
        }
    } else {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static NEXT_CPU: AtomicUsize = AtomicUsize::new(0);

        /// Round-robin stand-in where the running CPU cannot be queried
        pub fn current_cpu() -> usize {
            NEXT_CPU.fetch_add(1, Ordering::Relaxed) % num_cpus()
        }
    }
}

/// Pin the calling thread to one CPU
///
/// Best effort; a refusal (cpuset restrictions, permissions) is logged
/// and the carrier keeps running unpinned.
#[cfg(unix)]
pub fn pin_to_cpu(cpu: usize) {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut set = CpuSet::new();
    if set.set(cpu).is_err() {
        kwarn!("pin_to_cpu: cpu {} out of cpuset range", cpu);
        return;
    }
    if let Err(e) = sched_setaffinity(Pid::from_raw(0), &set) {
        kwarn!("pin_to_cpu({}) failed: {}", cpu, e);
    }
}

#[cfg(not(unix))]
pub fn pin_to_cpu(_cpu: usize) {}

/// OS thread id of the calling thread
#[cfg(unix)]
#[inline]
pub fn thread_id() -> u64 {
    unsafe { libc::pthread_self() as u64 }
}

#[cfg(not(unix))]
#[inline]
pub fn thread_id() -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ns_monotonic() {
        let a = now_ns();
        let b = now_ns();
        assert!(b >= a);
    }

    #[test]
    fn test_num_cpus_bounds() {
        let n = num_cpus();
        assert!(n >= 1);
        assert!(n <= MAX_CPUS);
    }

    #[cfg(unix)]
    #[test]
    fn test_thread_id_nonzero() {
        assert_ne!(thread_id(), 0);
    }
}
