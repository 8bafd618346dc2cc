//! Linux futex-based wait points
//!
//! The futex word is the permit count itself:
//! - 0 = no permit, waiters sleep
//! - n = n resumes pending, next wait consumes one without sleeping
//!
//! Grant always issues FUTEX_WAKE after bumping the count. If the waiter
//! has not reached the kernel yet, its FUTEX_WAIT re-checks the word and
//! returns EAGAIN, so the permit is never lost.

use super::ContextParking;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use umsched_core::{InterruptFlag, UmsResult};

/// Futex-backed wait point
pub struct FutexWaitPoint {
    /// Futex word: pending permit count
    permits: AtomicU32,

    /// 1 while a thread is inside FUTEX_WAIT (introspection only)
    parked: AtomicUsize,
}

impl FutexWaitPoint {
    pub fn new() -> Self {
        Self {
            permits: AtomicU32::new(0),
            parked: AtomicUsize::new(0),
        }
    }

    /// Try to consume one permit without blocking
    fn try_consume(&self) -> bool {
        let mut cur = self.permits.load(Ordering::Acquire);
        while cur > 0 {
            match self.permits.compare_exchange_weak(
                cur,
                cur - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => cur = observed,
            }
        }
        false
    }

    /// FUTEX_WAIT while the word is 0
    fn futex_sleep(&self) {
        self.parked.fetch_add(1, Ordering::SeqCst);
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.permits.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32, // Sleep only while permits == 0
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
        // EAGAIN (word changed) and EINTR both fall through to the
        // caller's re-check loop.
        self.parked.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for FutexWaitPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextParking for FutexWaitPoint {
    fn wait(&self) {
        loop {
            if self.try_consume() {
                return;
            }
            self.futex_sleep();
        }
    }

    fn wait_interruptible(&self, flag: &InterruptFlag) -> UmsResult<()> {
        loop {
            // Interrupt wins over a pending permit
            flag.check()?;
            if self.try_consume() {
                return Ok(());
            }
            self.futex_sleep();
        }
    }

    fn grant(&self) {
        self.permits.fetch_add(1, Ordering::Release);

        // FUTEX_WAKE: wake the (single) waiter if it is in the kernel
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.permits.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn reset(&self) {
        self.permits.store(0, Ordering::Release);
    }

    fn has_permit(&self) -> bool {
        self.permits.load(Ordering::Acquire) > 0
    }
}

// Safety: FutexWaitPoint only contains atomics
unsafe impl Send for FutexWaitPoint {}
unsafe impl Sync for FutexWaitPoint {}
