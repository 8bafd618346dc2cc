//! Interrupt flag for blocking reservation waits
//!
//! A carrier blocked in a reservation wait can be interrupted when its
//! scheduler is torn down. The flag is sticky: once set it stays set,
//! so a carrier woken after teardown re-checks and bails out.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{UmsError, UmsResult};

/// Flag for waking a carrier out of a blocking wait
///
/// Each worker owns one flag, shared with any wait it enters. Teardown
/// sets the flag and wakes the waiter; the waiter sees the flag and
/// returns `Err(UmsError::Interrupted)`.
#[derive(Clone)]
pub struct InterruptFlag {
    inner: InterruptInner,
}

#[derive(Clone)]
enum InterruptInner {
    /// Heap-allocated flag shared between the worker and its waits
    Shared(Arc<AtomicBool>),
    /// Dummy flag that never interrupts
    Dummy,
}

impl InterruptFlag {
    /// Create a new flag, initially clear
    pub fn new() -> Self {
        Self {
            inner: InterruptInner::Shared(Arc::new(AtomicBool::new(false))),
        }
    }

    /// Create a dummy flag that never interrupts
    ///
    /// Used for waits entered by threads that have no worker, such as a
    /// list creator blocking in a reservation before any carrier exists.
    pub fn dummy() -> Self {
        Self {
            inner: InterruptInner::Dummy,
        }
    }

    /// Check if an interrupt was requested
    #[inline]
    pub fn is_set(&self) -> bool {
        match &self.inner {
            InterruptInner::Shared(flag) => flag.load(Ordering::Acquire),
            InterruptInner::Dummy => false,
        }
    }

    /// Request an interrupt
    ///
    /// The flag stays set until `reset`. Waking the blocked thread is the
    /// caller's job; this only arms the flag it will observe.
    pub fn set(&self) {
        match &self.inner {
            InterruptInner::Shared(flag) => flag.store(true, Ordering::Release),
            InterruptInner::Dummy => {}
        }
    }

    /// Check the flag and return an error if set
    #[inline]
    pub fn check(&self) -> UmsResult<()> {
        if self.is_set() {
            Err(UmsError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Clear the flag (for worker slot reuse)
    pub fn reset(&self) {
        match &self.inner {
            InterruptInner::Shared(flag) => flag.store(false, Ordering::Release),
            InterruptInner::Dummy => {}
        }
    }
}

impl Default for InterruptFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InterruptFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptFlag")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_interrupt() {
        let flag = InterruptFlag::new();

        assert!(!flag.is_set());
        assert!(flag.check().is_ok());

        flag.set();

        assert!(flag.is_set());
        assert!(matches!(flag.check(), Err(UmsError::Interrupted)));
    }

    #[test]
    fn test_clone_shares_state() {
        let flag1 = InterruptFlag::new();
        let flag2 = flag1.clone();

        flag1.set();
        assert!(flag2.is_set());
    }

    #[test]
    fn test_reset() {
        let flag = InterruptFlag::new();
        flag.set();
        assert!(flag.is_set());

        flag.reset();
        assert!(!flag.is_set());
    }

    #[test]
    fn test_dummy_flag() {
        let flag = InterruptFlag::dummy();
        assert!(!flag.is_set());
        flag.set(); // Should be no-op
        assert!(!flag.is_set());
        assert!(flag.check().is_ok());
    }
}
