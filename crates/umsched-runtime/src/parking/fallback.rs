//! Fallback wait points using std::sync::Condvar
//!
//! Used on platforms without futex support. Less efficient but portable.

use super::ContextParking;
use std::sync::{Condvar, Mutex};
use umsched_core::{InterruptFlag, UmsResult};

/// Condvar-based wait point (fallback)
pub struct FallbackWaitPoint {
    /// Pending permit count
    permits: Mutex<u32>,

    /// Signalled on grant
    condvar: Condvar,
}

impl FallbackWaitPoint {
    pub fn new() -> Self {
        Self {
            permits: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }
}

impl Default for FallbackWaitPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextParking for FallbackWaitPoint {
    fn wait(&self) {
        let mut guard = self.permits.lock().unwrap();
        while *guard == 0 {
            guard = self.condvar.wait(guard).unwrap();
        }
        *guard -= 1;
    }

    fn wait_interruptible(&self, flag: &InterruptFlag) -> UmsResult<()> {
        let mut guard = self.permits.lock().unwrap();
        loop {
            flag.check()?;
            if *guard > 0 {
                *guard -= 1;
                return Ok(());
            }
            guard = self.condvar.wait(guard).unwrap();
        }
    }

    fn grant(&self) {
        {
            let mut guard = self.permits.lock().unwrap();
            *guard += 1;
        }
        self.condvar.notify_one();
    }

    fn reset(&self) {
        let mut guard = self.permits.lock().unwrap();
        *guard = 0;
    }

    fn has_permit(&self) -> bool {
        *self.permits.lock().unwrap() > 0
    }
}
