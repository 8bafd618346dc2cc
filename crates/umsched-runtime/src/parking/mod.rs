//! Per-context wait points
//!
//! Every execution context (carrier or completion element) owns one wait
//! point. A switch resumes the target by granting it a permit, then parks
//! the caller on its own point. Permits count, so a resume that lands
//! before the target parks is consumed by the next wait instead of lost.

use umsched_core::{InterruptFlag, UmsResult};

/// Platform-specific wait point for one suspended thread
///
/// At most one thread ever waits on a given point (the thread bound to
/// the owning context slot). Any thread may grant.
pub trait ContextParking: Send + Sync {
    /// Block until a permit is available, then consume it
    ///
    /// A permit granted before the wait is consumed immediately.
    fn wait(&self);

    /// Like `wait`, but returns `Err(UmsError::Interrupted)` once the
    /// flag is set
    ///
    /// The interrupter must set the flag and then grant, in that order.
    /// An unconsumed permit may be left behind; `reset` clears it when
    /// the slot is rebound.
    fn wait_interruptible(&self, flag: &InterruptFlag) -> UmsResult<()>;

    /// Deposit one permit and wake the waiter if there is one
    fn grant(&self);

    /// Drop any accumulated permits
    ///
    /// Only valid while no thread can be waiting (the owning slot is free).
    fn reset(&self);

    /// Whether a permit is currently available (hint, may be stale)
    fn has_permit(&self) -> bool;
}

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexWaitPoint as PlatformWaitPoint;
    } else {
        mod fallback;
        pub use fallback::FallbackWaitPoint as PlatformWaitPoint;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use umsched_core::UmsError;

    #[test]
    fn test_grant_before_wait_not_lost() {
        let point = PlatformWaitPoint::new();
        point.grant();
        assert!(point.has_permit());
        point.wait(); // Consumes the stored permit, no block
        assert!(!point.has_permit());
    }

    #[test]
    fn test_cross_thread_wake() {
        let point = Arc::new(PlatformWaitPoint::new());
        let point2 = Arc::clone(&point);

        let handle = thread::spawn(move || {
            point2.wait();
            true
        });

        // Give thread time to park
        thread::sleep(Duration::from_millis(50));
        point.grant();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_permits_accumulate() {
        let point = PlatformWaitPoint::new();
        point.grant();
        point.grant();
        point.wait();
        point.wait(); // Second permit still there
        assert!(!point.has_permit());
    }

    #[test]
    fn test_interrupt_wakes_waiter() {
        let point = Arc::new(PlatformWaitPoint::new());
        let flag = InterruptFlag::new();
        let point2 = Arc::clone(&point);
        let flag2 = flag.clone();

        let handle = thread::spawn(move || point2.wait_interruptible(&flag2));

        thread::sleep(Duration::from_millis(50));
        // Flag first, then grant
        flag.set();
        point.grant();

        assert!(matches!(handle.join().unwrap(), Err(UmsError::Interrupted)));
    }

    #[test]
    fn test_reset_clears_permits() {
        let point = PlatformWaitPoint::new();
        point.grant();
        point.grant();
        point.reset();
        assert!(!point.has_permit());
    }
}
