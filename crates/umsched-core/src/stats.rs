//! Per-element and per-worker bookkeeping
//!
//! `WorkerState` is cache-line aligned so independent carriers never share
//! a line; an introspection reader can scan worker state without locks.
//! All timestamps are nanoseconds from the runtime's monotonic clock,
//! passed in by the caller so this crate stays platform-agnostic.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::constants::{CACHE_LINE_SIZE, ELEM_NONE};
use crate::id::ElemId;

/// Size of WorkerState (one cache line)
pub const WORKER_STATE_SIZE: usize = CACHE_LINE_SIZE;

/// Switch statistics for one completion element
///
/// `switch_started` is recorded by the dispatching side when it picks the
/// element; `switched_in` by the element itself once it is actually on a
/// carrier; `switched_out` when it stores its context and leaves.
#[derive(Debug)]
pub struct ElemStats {
    /// Number of completed switch-ins
    pub n_switches: AtomicU64,

    /// Total time spent hosted, accumulated at switch-out
    pub active_ns: AtomicU64,

    /// Timestamp of the most recent dispatch decision
    pub last_switch_start_ns: AtomicU64,

    /// Timestamp of the most recent switch-in (0 while not hosted)
    run_start_ns: AtomicU64,
}

impl ElemStats {
    pub const fn new() -> Self {
        Self {
            n_switches: AtomicU64::new(0),
            active_ns: AtomicU64::new(0),
            last_switch_start_ns: AtomicU64::new(0),
            run_start_ns: AtomicU64::new(0),
        }
    }

    /// A dispatcher picked this element
    #[inline]
    pub fn switch_started(&self, now_ns: u64) {
        self.last_switch_start_ns.store(now_ns, Ordering::Relaxed);
    }

    /// The element is on a carrier
    #[inline]
    pub fn switched_in(&self, now_ns: u64) {
        self.n_switches.fetch_add(1, Ordering::Relaxed);
        self.run_start_ns.store(now_ns, Ordering::Relaxed);
    }

    /// The element left its carrier
    #[inline]
    pub fn switched_out(&self, now_ns: u64) {
        let start = self.run_start_ns.swap(0, Ordering::Relaxed);
        if start != 0 && now_ns > start {
            self.active_ns.fetch_add(now_ns - start, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ElemStatsSnapshot {
        ElemStatsSnapshot {
            n_switches: self.n_switches.load(Ordering::Relaxed),
            active_ns: self.active_ns.load(Ordering::Relaxed),
            last_switch_start_ns: self.last_switch_start_ns.load(Ordering::Relaxed),
        }
    }
}

impl Default for ElemStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only copy of element statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElemStatsSnapshot {
    pub n_switches: u64,
    pub active_ns: u64,
    pub last_switch_start_ns: u64,
}

/// Per-worker state, one cache line
///
/// Layout (64 bytes):
/// ```text
/// 0x00: current_element  (u32) - Hosted element id, ELEM_NONE if idle
/// 0x04: n_dispatches     (u32) - Completed exec calls
/// 0x08: run_start_ns     (u64) - When the hosted element started
/// 0x10: last_activity_ns (u64) - Last dispatch or yield return
/// 0x18: thread_id        (u64) - Carrier pthread_t
/// 0x20: is_parked        (u8)  - Carrier parked in exec
/// 0x21: padding          (31 bytes)
/// ```
#[repr(C, align(64))]
pub struct WorkerState {
    /// Hosted element (ELEM_NONE when the carrier runs its own loop)
    pub current_element: AtomicU32,

    /// Completed exec calls on this worker
    pub n_dispatches: AtomicU32,

    /// Timestamp when the current element was switched in
    pub run_start_ns: AtomicU64,

    /// Timestamp of the last dispatch activity
    pub last_activity_ns: AtomicU64,

    /// OS thread id of the carrier (pthread_t)
    pub thread_id: AtomicU64,

    /// Carrier parked in exec waiting for its hosted element to leave
    pub is_parked: AtomicBool,

    /// Padding to fill the cache line
    _padding: [u8; 31],
}

impl WorkerState {
    pub const fn new() -> Self {
        Self {
            current_element: AtomicU32::new(ELEM_NONE),
            n_dispatches: AtomicU32::new(0),
            run_start_ns: AtomicU64::new(0),
            last_activity_ns: AtomicU64::new(0),
            thread_id: AtomicU64::new(0),
            is_parked: AtomicBool::new(false),
            _padding: [0; 31],
        }
    }

    /// Record that an element was switched onto this worker
    #[inline]
    pub fn start_running(&self, elem: ElemId, now_ns: u64) {
        self.run_start_ns.store(now_ns, Ordering::Relaxed);
        self.last_activity_ns.store(now_ns, Ordering::Relaxed);
        self.current_element.store(elem.as_u32(), Ordering::Release);
    }

    /// Record that the hosted element left this worker
    #[inline]
    pub fn stop_running(&self, now_ns: u64) {
        self.current_element.store(ELEM_NONE, Ordering::Release);
        self.n_dispatches.fetch_add(1, Ordering::Relaxed);
        self.last_activity_ns.store(now_ns, Ordering::Relaxed);
    }

    /// Hosted element, if any
    #[inline]
    pub fn current(&self) -> ElemId {
        ElemId::new(self.current_element.load(Ordering::Acquire))
    }

    /// Check if the carrier is running its own loop
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.current_element.load(Ordering::Relaxed) == ELEM_NONE
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            current_element: self.current(),
            n_dispatches: self.n_dispatches.load(Ordering::Relaxed),
            run_start_ns: self.run_start_ns.load(Ordering::Relaxed),
            last_activity_ns: self.last_activity_ns.load(Ordering::Relaxed),
            parked: self.is_parked.load(Ordering::Relaxed),
        }
    }
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only copy of worker state
#[derive(Debug, Clone, Copy)]
pub struct WorkerSnapshot {
    pub current_element: ElemId,
    pub n_dispatches: u32,
    pub run_start_ns: u64,
    pub last_activity_ns: u64,
    pub parked: bool,
}

// Verify size at compile time
const _: () = {
    assert!(core::mem::size_of::<WorkerState>() == WORKER_STATE_SIZE);
    assert!(core::mem::align_of::<WorkerState>() == CACHE_LINE_SIZE);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_state_size() {
        assert_eq!(core::mem::size_of::<WorkerState>(), 64);
        assert_eq!(core::mem::align_of::<WorkerState>(), 64);
    }

    #[test]
    fn test_worker_state_operations() {
        let w = WorkerState::new();
        assert!(w.is_idle());

        let id = ElemId::new(42);
        w.start_running(id, 1000);
        assert!(!w.is_idle());
        assert_eq!(w.current(), id);

        w.stop_running(2000);
        assert!(w.is_idle());
        assert_eq!(w.n_dispatches.load(Ordering::Relaxed), 1);
        assert_eq!(w.last_activity_ns.load(Ordering::Relaxed), 2000);
    }

    #[test]
    fn test_elem_stats_accumulation() {
        let s = ElemStats::new();
        s.switch_started(50);
        s.switched_in(100);
        s.switched_out(350);
        s.switch_started(900);
        s.switched_in(1000);
        s.switched_out(1100);

        let snap = s.snapshot();
        assert_eq!(snap.n_switches, 2);
        assert_eq!(snap.active_ns, 350);
        assert_eq!(snap.last_switch_start_ns, 900);
    }

    #[test]
    fn test_switched_out_without_in_is_harmless() {
        let s = ElemStats::new();
        s.switched_out(500);
        assert_eq!(s.snapshot().active_ns, 0);
    }
}
