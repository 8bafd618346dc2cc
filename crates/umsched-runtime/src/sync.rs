//! Counting semaphore gating completion list reservations
//!
//! Permit count tracks queued ready elements. Reservers block on the
//! first permit; teardown paths wake blocked reservers without permits
//! so they can observe a closed list or an interrupt flag and bail out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use umsched_core::{InterruptFlag, UmsError, UmsResult};

/// Counting semaphore with closable wait
pub struct Semaphore {
    /// Available permits
    count: Mutex<u32>,

    /// Signalled on release, close and wake_all
    condvar: Condvar,

    /// Once set, blocked and future acquires fail with Gone
    closed: AtomicBool,
}

impl Semaphore {
    pub fn new(initial: u32) -> Self {
        Self {
            count: Mutex::new(initial),
            condvar: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Block until a permit is available, consume it
    ///
    /// Wakes with `Err(UmsError::Interrupted)` when the flag is set, or
    /// `Err(UmsError::Gone)` when the semaphore is closed. The interrupt
    /// check runs first, so a carrier torn down while its list is also
    /// closing reports the interrupt.
    pub fn acquire_interruptible(&self, flag: &InterruptFlag) -> UmsResult<()> {
        let mut guard = self.count.lock().unwrap();
        loop {
            flag.check()?;
            if self.closed.load(Ordering::Acquire) {
                return Err(UmsError::Gone);
            }
            if *guard > 0 {
                *guard -= 1;
                return Ok(());
            }
            guard = self.condvar.wait(guard).unwrap();
        }
    }

    /// Consume a permit if one is available, never blocks
    pub fn try_acquire(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let mut guard = self.count.lock().unwrap();
        if *guard > 0 {
            *guard -= 1;
            true
        } else {
            false
        }
    }

    /// Add `n` permits and wake waiters
    pub fn release(&self, n: u32) {
        {
            let mut guard = self.count.lock().unwrap();
            *guard = guard.saturating_add(n);
        }
        if n == 1 {
            self.condvar.notify_one();
        } else if n > 1 {
            self.condvar.notify_all();
        }
    }

    /// Close the semaphore and wake all waiters
    ///
    /// Blocked acquires return `Err(UmsError::Gone)`; remaining permits
    /// are unreachable afterwards.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Take the lock so no waiter can be between its check and the wait
        let _guard = self.count.lock().unwrap();
        self.condvar.notify_all();
    }

    /// Wake all waiters without granting permits
    ///
    /// Used after setting interrupt flags so affected waiters re-check.
    pub fn wake_all(&self) {
        let _guard = self.count.lock().unwrap();
        self.condvar.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Current permit count (hint, may be stale)
    pub fn available(&self) -> u32 {
        *self.count.lock().unwrap()
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("available", &self.available())
            .field("closed", &self.is_closed())
            .finish()
    }
}
