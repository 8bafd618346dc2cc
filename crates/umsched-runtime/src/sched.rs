//! Schedulers and carrier workers
//!
//! A scheduler binds one completion list to at most one worker per CPU.
//! Workers are bound lazily, once, by the carrier thread that registers
//! on that CPU; the slot stays bound until the scheduler is torn down.
//!
//! Worker state lives behind an `Arc` so carriers and hosted elements
//! can update dispatch bookkeeping after dropping their registry guards.
//! Teardown never frees it out from under them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use umsched_core::id::{ElemId, ListId, SchedId};
use umsched_core::{InterruptFlag, SavedContext, UmsError, UmsResult, WorkerState};

use crate::parking::PlatformWaitPoint;

/// In-runtime representative of one carrier OS thread
pub struct Worker {
    pub cpu: usize,

    /// Hosted element and dispatch counters, one cache line
    pub state: WorkerState,

    /// Carrier's own dispatch-loop context, captured at registration
    entry_context: AtomicU64,

    /// Armed by scheduler teardown to unblock the carrier
    pub interrupt: InterruptFlag,
}

impl Worker {
    pub fn new(cpu: usize) -> Self {
        Self {
            cpu,
            state: WorkerState::new(),
            entry_context: AtomicU64::new(SavedContext::invalid().to_bits()),
            interrupt: InterruptFlag::new(),
        }
    }

    pub fn set_entry_context(&self, ctx: SavedContext) {
        self.entry_context.store(ctx.to_bits(), Ordering::Release);
    }

    pub fn entry_context(&self) -> SavedContext {
        SavedContext::from_bits(self.entry_context.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> WorkerInfo {
        let s = self.state.snapshot();
        WorkerInfo {
            cpu: self.cpu,
            current_element: s.current_element,
            n_dispatches: s.n_dispatches,
            parked: s.parked,
        }
    }
}

/// Read-only view of one registered worker
#[derive(Debug, Clone, Copy)]
pub struct WorkerInfo {
    pub cpu: usize,
    pub current_element: ElemId,
    pub n_dispatches: u32,
    pub parked: bool,
}

/// Binding between one completion list and per-CPU workers
pub struct Scheduler {
    pub id: SchedId,
    pub list: ListId,

    /// One slot per CPU, bound at most once
    workers: Vec<OnceLock<Arc<Worker>>>,

    /// Callers blocked in wait() until teardown
    waiters: Mutex<Vec<Arc<PlatformWaitPoint>>>,
}

impl Scheduler {
    pub fn new(id: SchedId, list: ListId, num_cpus: usize) -> Self {
        let mut workers = Vec::with_capacity(num_cpus);
        workers.resize_with(num_cpus, OnceLock::new);
        Self {
            id,
            list,
            workers,
            waiters: Mutex::new(Vec::new()),
        }
    }

    pub fn num_slots(&self) -> usize {
        self.workers.len()
    }

    /// Bind `worker` to its CPU slot
    pub fn bind_worker(&self, worker: Arc<Worker>) -> UmsResult<()> {
        let cpu = worker.cpu;
        let slot = self
            .workers
            .get(cpu)
            .ok_or(UmsError::InvariantViolation)?;
        slot.set(worker).map_err(|_| UmsError::AlreadyRegistered)
    }

    /// Worker bound to `cpu`, if any
    pub fn worker(&self, cpu: usize) -> Option<Arc<Worker>> {
        self.workers.get(cpu).and_then(|slot| slot.get()).cloned()
    }

    /// All bound workers
    pub fn workers(&self) -> Vec<Arc<Worker>> {
        self.workers
            .iter()
            .filter_map(|slot| slot.get())
            .cloned()
            .collect()
    }

    pub fn add_waiter(&self, point: Arc<PlatformWaitPoint>) {
        self.waiters.lock().unwrap().push(point);
    }

    pub fn drain_waiters(&self) -> Vec<Arc<PlatformWaitPoint>> {
        std::mem::take(&mut *self.waiters.lock().unwrap())
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }

    pub fn snapshot(&self) -> SchedInfo {
        SchedInfo {
            id: self.id,
            list: self.list,
            slots: self.num_slots(),
            workers: self.workers().iter().map(|w| w.snapshot()).collect(),
            waiters: self.waiter_count(),
        }
    }
}

/// Read-only view of one scheduler
#[derive(Debug, Clone)]
pub struct SchedInfo {
    pub id: SchedId,
    pub list: ListId,
    pub slots: usize,
    pub workers: Vec<WorkerInfo>,
    pub waiters: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parking::ContextParking;

    #[test]
    fn test_worker_slot_binds_once() {
        let sched = Scheduler::new(SchedId::new(1), ListId::new(1), 2);
        assert!(sched.worker(0).is_none());

        sched.bind_worker(Arc::new(Worker::new(0))).unwrap();
        assert!(sched.worker(0).is_some());
        assert!(sched.worker(1).is_none());

        assert!(matches!(
            sched.bind_worker(Arc::new(Worker::new(0))),
            Err(UmsError::AlreadyRegistered)
        ));

        sched.bind_worker(Arc::new(Worker::new(1))).unwrap();
        assert_eq!(sched.workers().len(), 2);
    }

    #[test]
    fn test_bind_out_of_range_cpu() {
        let sched = Scheduler::new(SchedId::new(2), ListId::new(1), 1);
        assert!(matches!(
            sched.bind_worker(Arc::new(Worker::new(5))),
            Err(UmsError::InvariantViolation)
        ));
    }

    #[test]
    fn test_entry_context_round_trip() {
        let worker = Worker::new(0);
        assert!(!worker.entry_context().is_valid());

        let ctx = SavedContext::new(4, 9);
        worker.set_entry_context(ctx);
        assert_eq!(worker.entry_context(), ctx);
    }

    #[test]
    fn test_waiters_drain_once() {
        let sched = Scheduler::new(SchedId::new(3), ListId::new(1), 1);
        sched.add_waiter(Arc::new(PlatformWaitPoint::new()));
        sched.add_waiter(Arc::new(PlatformWaitPoint::new()));
        assert_eq!(sched.waiter_count(), 2);

        let drained = sched.drain_waiters();
        assert_eq!(drained.len(), 2);
        assert_eq!(sched.waiter_count(), 0);
        assert!(sched.drain_waiters().is_empty());

        // Granting drained waiters must not panic
        for point in drained {
            point.grant();
        }
    }

    #[test]
    fn test_snapshot_counts() {
        let sched = Scheduler::new(SchedId::new(4), ListId::new(2), 3);
        sched.bind_worker(Arc::new(Worker::new(1))).unwrap();

        let info = sched.snapshot();
        assert_eq!(info.slots, 3);
        assert_eq!(info.workers.len(), 1);
        assert_eq!(info.workers[0].cpu, 1);
        assert_eq!(info.list, ListId::new(2));
    }
}
