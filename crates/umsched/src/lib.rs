//! # umsched - User-Mode Scheduling
//!
//! Cooperative M:N scheduling for Rust: many logical threads (completion
//! elements) multiplexed onto a few carrier threads, one per CPU.
//!
//! ## Features
//!
//! - **Completion lists**: FIFO ready-queues of suspended logical threads,
//!   shared by any number of schedulers
//! - **Batch reservation**: dequeue one element guaranteed, more
//!   best-effort; unrun batch members return to ready automatically
//! - **User-driven dispatch**: the scheduling loop is an ordinary closure
//!   calling `reserve` and `exec`, not a built-in policy
//! - **Delete-safe ids**: every entity lives behind a registry that makes
//!   concurrent lookup and teardown race-free
//! - **Cascading teardown**: removing the last element destroys the list
//!   and every scheduler attached to it, waking all blocked callers
//!
//! ## Quick Start
//!
//! ```ignore
//! use umsched::{Ums, UmsConfig};
//!
//! fn main() {
//!     let ums = Ums::new(UmsConfig::default()).unwrap();
//!     let list = ums.create_completion_list().unwrap();
//!
//!     // Logical threads: run, yield, run again, exit
//!     for _ in 0..16 {
//!         let h = ums.handle();
//!         ums.create_completion_element(list, move |me| {
//!             println!("element {} running", me);
//!             h.yield_now().unwrap();
//!             println!("element {} back", me);
//!             0
//!         })
//!         .unwrap();
//!     }
//!
//!     // Dispatch loop, one carrier per CPU
//!     let h = ums.handle();
//!     ums.enter_scheduling_mode(
//!         move |_sched| loop {
//!             let ids = match h.reserve(list, 2) {
//!                 Ok(ids) => ids,
//!                 Err(_) => return 0, // teardown
//!             };
//!             if h.exec(ids[0]).is_err() {
//!                 return 0;
//!             }
//!         },
//!         list,
//!     )
//!     .unwrap();
//!
//!     let statuses = ums.wait_children();
//!     println!("statuses: {:?}", statuses);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        User Code                            │
//! │        element bodies, scheduling-loop closures             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Completion List                         │
//! │       ready FIFO + reservation semaphore + members          │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │ Scheduler │      │ Scheduler │      │  wait()   │
//!    │  worker   │      │  worker   │      │  callers  │
//!    │  per CPU  │      │  per CPU  │      └───────────┘
//!    └───────────┘      └───────────┘
//!          │                   │
//!          ▼                   ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │                   Context Table                         │
//!    │     parked threads, generation-checked resume           │
//!    └─────────────────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use umsched_core::{
    ElemId, ElemState, ElemStatsSnapshot, InterruptFlag, ListId, SchedId, UmsError, UmsResult,
    WorkerSnapshot,
};

// Re-export kprint macros for debug logging
pub use umsched_core::kprint::{
    init as init_logging, set_flush_enabled, set_log_level, LogLevel,
};
pub use umsched_core::{kdebug, kerror, kinfo, kprint, kprintln, ktrace, kwarn};

// Re-export env utilities
pub use umsched_core::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

// Re-export runtime types
pub use umsched_runtime::{
    ElemInfo, ListInfo, Runtime, SchedInfo, UmsConfig, WorkerInfo, WorkerRef,
};

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use umsched_runtime::platform;

/// Shareable handle into a scheduling session
///
/// Cheap to clone. Element bodies and scheduling-loop closures capture one
/// of these to reach the runtime operations; there is no global state.
#[derive(Clone)]
pub struct UmsHandle {
    rt: Arc<Runtime>,
}

impl UmsHandle {
    /// Reserve up to `want` ready elements, blocking for the first
    pub fn reserve(&self, list: ListId, want: u32) -> UmsResult<Vec<ElemId>> {
        self.rt.reserve(list, want)
    }

    /// Switch execution to a reserved element
    ///
    /// From a carrier this blocks until the element yields back or is
    /// removed. From inside an element body it stores and requeues the
    /// caller first, then returns once the caller is next dispatched.
    pub fn exec(&self, elem: ElemId) -> UmsResult<()> {
        self.rt.exec(elem)
    }

    /// Yield the calling element back to its carrier
    ///
    /// Returns once the element is dispatched again. No-op on an idle
    /// carrier thread.
    pub fn yield_now(&self) -> UmsResult<()> {
        self.rt.yield_current()
    }

    /// Block until the scheduler is torn down
    pub fn wait_scheduler(&self, sched: SchedId) -> UmsResult<()> {
        self.rt.wait_scheduler(sched)
    }

    /// List the calling thread operates against, if it has a role
    pub fn current_list(&self) -> Option<ListId> {
        self.rt.current_list()
    }

    pub fn list_exists(&self, list: ListId) -> bool {
        self.rt.list_exists(list)
    }

    pub fn element_info(&self, elem: ElemId) -> UmsResult<ElemInfo> {
        self.rt.element_info(elem)
    }

    pub fn list_info(&self, list: ListId) -> UmsResult<ListInfo> {
        self.rt.list_info(list)
    }

    pub fn sched_info(&self, sched: SchedId) -> UmsResult<SchedInfo> {
        self.rt.sched_info(sched)
    }

    /// Live execution contexts (carriers plus elements)
    pub fn contexts_live(&self) -> usize {
        self.rt.contexts_live()
    }
}

/// A scheduling session
///
/// Owns the runtime and every thread it spawns: one backing thread per
/// completion element, one carrier thread per CPU per scheduler. The
/// session ends when `wait_children` has joined them all, which happens
/// naturally once every element has run to completion and teardown has
/// cascaded through the schedulers.
pub struct Ums {
    rt: Arc<Runtime>,
    elements: Mutex<Vec<JoinHandle<i32>>>,
    carriers: Mutex<Vec<JoinHandle<i32>>>,
}

impl Ums {
    pub fn new(config: UmsConfig) -> UmsResult<Self> {
        Ok(Self {
            rt: Arc::new(Runtime::new(config)?),
            elements: Mutex::new(Vec::new()),
            carriers: Mutex::new(Vec::new()),
        })
    }

    /// Handle for use inside element bodies and scheduling loops
    pub fn handle(&self) -> UmsHandle {
        UmsHandle {
            rt: Arc::clone(&self.rt),
        }
    }

    pub fn create_completion_list(&self) -> UmsResult<ListId> {
        self.rt.create_list()
    }

    /// Spawn a completion element on `list`
    ///
    /// The body runs on its own backing thread, but only while a carrier
    /// hosts it. Returns the element id as soon as the element is
    /// registered and queued; the backing thread blocks until its first
    /// dispatch.
    pub fn create_completion_element<F>(&self, list: ListId, body: F) -> UmsResult<ElemId>
    where
        F: FnOnce(ElemId) -> i32 + Send + 'static,
    {
        let rt = Arc::clone(&self.rt);
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("ums-elem-{}", list))
            .stack_size(self.rt.config().stack_size)
            .spawn(move || element_main(&rt, list, body, &tx))?;

        match rx.recv() {
            Ok(Ok(elem)) => {
                self.elements.lock().unwrap().push(handle);
                Ok(elem)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            // Thread died before reporting
            Err(_) => {
                let _ = handle.join();
                Err(UmsError::Gone)
            }
        }
    }

    /// Create a list populated with one element per body
    ///
    /// One-call variant of `create_completion_list` followed by
    /// `create_completion_element` for each body. Returns the list and the
    /// element ids in body order. On a mid-way failure the elements
    /// created so far stay alive and joinable through `wait_children`.
    pub fn create_completion_list_with<F>(&self, bodies: Vec<F>) -> UmsResult<(ListId, Vec<ElemId>)>
    where
        F: FnOnce(ElemId) -> i32 + Send + 'static,
    {
        let list = self.create_completion_list()?;
        let mut elems = Vec::with_capacity(bodies.len());
        for body in bodies {
            elems.push(self.create_completion_element(list, body)?);
        }
        Ok((list, elems))
    }

    /// Create a scheduler on `list` and start one carrier per CPU
    ///
    /// Every carrier registers its worker slot and then runs `entry`,
    /// which is expected to loop over `reserve` and `exec` until either
    /// returns an error (teardown). The carrier's status is whatever
    /// `entry` returns.
    pub fn enter_scheduling_mode<F>(&self, entry: F, list: ListId) -> UmsResult<SchedId>
    where
        F: Fn(SchedId) -> i32 + Send + Sync + 'static,
    {
        let sched = self.rt.create_scheduler(list)?;
        let entry = Arc::new(entry);
        let pin = self.rt.config().pin_carriers;

        for cpu in 0..self.rt.config().num_cpus {
            let rt = Arc::clone(&self.rt);
            let entry = Arc::clone(&entry);
            let handle = thread::Builder::new()
                .name(format!("ums-worker-{}", cpu))
                .spawn(move || carrier_main(&rt, sched, cpu, pin, &*entry))?;
            self.carriers.lock().unwrap().push(handle);
        }
        Ok(sched)
    }

    /// Block until the scheduler is torn down
    pub fn wait_scheduler(&self, sched: SchedId) -> UmsResult<()> {
        self.rt.wait_scheduler(sched)
    }

    /// Join every spawned thread and collect their statuses
    ///
    /// Element statuses come first in creation order, then carrier
    /// statuses in spawn order. A panicked thread reports -1.
    pub fn wait_children(&self) -> Vec<i32> {
        let elements = std::mem::take(&mut *self.elements.lock().unwrap());
        let carriers = std::mem::take(&mut *self.carriers.lock().unwrap());

        let mut statuses = Vec::with_capacity(elements.len() + carriers.len());
        for handle in elements.into_iter().chain(carriers) {
            match handle.join() {
                Ok(status) => statuses.push(status),
                Err(_) => {
                    kwarn!("child thread panicked");
                    statuses.push(-1);
                }
            }
        }
        statuses
    }
}

/// Backing-thread main for a completion element
fn element_main<F>(
    rt: &Arc<Runtime>,
    list: ListId,
    body: F,
    created: &mpsc::Sender<UmsResult<ElemId>>,
) -> i32
where
    F: FnOnce(ElemId) -> i32,
{
    let elem = match rt.register_element(list) {
        Ok(id) => id,
        Err(e) => {
            let _ = created.send(Err(e));
            return -1;
        }
    };
    // Creator learns the id before we block
    let _ = created.send(Ok(elem));

    if let Err(e) = rt.park_until_hosted(elem) {
        kwarn!("element {}: first dispatch failed: {}", elem, e);
        let _ = rt.remove_element(elem);
        return -1;
    }

    // A panicking body must still run the exit protocol, or the list
    // never empties and teardown never fires
    let status = match panic::catch_unwind(AssertUnwindSafe(|| body(elem))) {
        Ok(status) => status,
        Err(_) => {
            kwarn!("element {}: body panicked", elem);
            -1
        }
    };

    if let Err(e) = rt.remove_element(elem) {
        kwarn!("element {}: removal failed: {}", elem, e);
    }
    status
}

/// Carrier-thread main: pin, register, run the user's dispatch loop
fn carrier_main<F>(rt: &Arc<Runtime>, sched: SchedId, cpu: usize, pin: bool, entry: &F) -> i32
where
    F: Fn(SchedId) -> i32,
{
    if pin {
        platform::pin_to_cpu(cpu);
    }
    if let Err(e) = rt.register_worker_on(sched, cpu) {
        kwarn!("worker {}: registration failed: {}", cpu, e);
        return -1;
    }
    let status = entry(sched);
    rt.unregister_current_worker();
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_config() -> UmsConfig {
        UmsConfig::new()
            .num_cpus(1)
            .max_contexts(64)
            .pin_carriers(false)
    }

    /// Standard dispatch loop: reserve a batch, exec the first, repeat
    /// until teardown reaches in.
    fn dispatch_entry(
        h: UmsHandle,
        list: ListId,
        batch: u32,
    ) -> impl Fn(SchedId) -> i32 + Send + Sync + 'static {
        move |_sched| loop {
            let ids = match h.reserve(list, batch) {
                Ok(ids) => ids,
                Err(_) => return 0,
            };
            if h.exec(ids[0]).is_err() {
                return 0;
            }
        }
    }

    #[test]
    fn test_elements_run_yield_and_teardown_cascades() {
        let ums = Ums::new(test_config()).unwrap();
        let list = ums.create_completion_list().unwrap();

        // Carriers first; they block on the empty list
        let sched = ums
            .enter_scheduling_mode(dispatch_entry(ums.handle(), list, 2), list)
            .unwrap();

        // A wait() caller blocked well before teardown can begin
        let waiter_h = ums.handle();
        let waiter = thread::spawn(move || waiter_h.wait_scheduler(sched));
        thread::sleep(Duration::from_millis(50));

        let phases = Arc::new(AtomicUsize::new(0));
        let mut created = Vec::new();
        for _ in 0..3 {
            let h = ums.handle();
            let phases = Arc::clone(&phases);
            let elem = ums
                .create_completion_element(list, move |me| {
                    phases.fetch_add(1, Ordering::SeqCst);
                    h.yield_now().unwrap();
                    phases.fetch_add(1, Ordering::SeqCst);
                    me.as_u32() as i32
                })
                .unwrap();
            created.push(elem);
        }

        let statuses = ums.wait_children();

        // 3 elements then 1 carrier
        assert_eq!(statuses.len(), 4);
        for (i, elem) in created.iter().enumerate() {
            assert_eq!(statuses[i], elem.as_u32() as i32);
        }
        assert_eq!(statuses[3], 0);
        assert_eq!(phases.load(Ordering::SeqCst), 6);

        // Cascade destroyed everything and woke the waiter
        assert!(waiter.join().unwrap().is_ok());
        let h = ums.handle();
        assert!(!h.list_exists(list));
        assert!(matches!(h.sched_info(sched), Err(UmsError::NotFound)));
        assert_eq!(h.contexts_live(), 0);
    }

    #[test]
    fn test_two_schedulers_share_one_list() {
        let ums = Ums::new(test_config()).unwrap();
        let list = ums.create_completion_list().unwrap();

        ums.enter_scheduling_mode(dispatch_entry(ums.handle(), list, 2), list)
            .unwrap();
        ums.enter_scheduling_mode(dispatch_entry(ums.handle(), list, 2), list)
            .unwrap();

        for _ in 0..8 {
            let h = ums.handle();
            ums.create_completion_element(list, move |_me| {
                h.yield_now().unwrap();
                1
            })
            .unwrap();
        }

        let statuses = ums.wait_children();
        assert_eq!(statuses.len(), 10);
        assert!(statuses[..8].iter().all(|&s| s == 1));
        assert!(statuses[8..].iter().all(|&s| s == 0));
        assert!(!ums.handle().list_exists(list));
    }

    #[test]
    fn test_element_hands_off_to_sibling() {
        let ums = Ums::new(test_config()).unwrap();
        let list = ums.create_completion_list().unwrap();

        let log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        // e1 reserves e2 from inside its body and switches to it directly
        let h1 = ums.handle();
        let log1 = Arc::clone(&log);
        let e1 = ums
            .create_completion_element(list, move |_me| {
                log1.lock().unwrap().push(1);
                let ids = h1.reserve(h1.current_list().unwrap(), 1).unwrap();
                h1.exec(ids[0]).unwrap();
                // Back after being re-dispatched
                log1.lock().unwrap().push(3);
                10
            })
            .unwrap();

        let log2 = Arc::clone(&log);
        let h2 = ums.handle();
        let e2 = ums
            .create_completion_element(list, move |_me| {
                log2.lock().unwrap().push(2);
                h2.yield_now().unwrap();
                log2.lock().unwrap().push(4);
                20
            })
            .unwrap();
        assert_ne!(e1, e2);

        ums.enter_scheduling_mode(dispatch_entry(ums.handle(), list, 1), list)
            .unwrap();

        let statuses = ums.wait_children();
        assert_eq!(statuses, vec![10, 20, 0]);

        // Single carrier makes the interleaving fully deterministic
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_panicking_body_still_tears_down() {
        let ums = Ums::new(test_config()).unwrap();
        let list = ums.create_completion_list().unwrap();

        let sched = ums
            .enter_scheduling_mode(dispatch_entry(ums.handle(), list, 1), list)
            .unwrap();

        ums.create_completion_element(list, |_me| -> i32 {
            panic!("element body exploded");
        })
        .unwrap();

        let statuses = ums.wait_children();
        assert_eq!(statuses, vec![-1, 0]);

        let h = ums.handle();
        assert!(!h.list_exists(list));
        assert!(matches!(h.sched_info(sched), Err(UmsError::NotFound)));
    }

    #[test]
    fn test_list_created_with_bodies() {
        let ums = Ums::new(test_config()).unwrap();

        fn body(_me: ElemId) -> i32 {
            7
        }
        let bodies = vec![body as fn(ElemId) -> i32, body, body];
        let (list, elems) = ums.create_completion_list_with(bodies).unwrap();
        assert_eq!(elems.len(), 3);
        assert_eq!(ums.handle().list_info(list).unwrap().members, 3);

        ums.enter_scheduling_mode(dispatch_entry(ums.handle(), list, 2), list)
            .unwrap();

        let statuses = ums.wait_children();
        assert_eq!(statuses, vec![7, 7, 7, 0]);
    }

    #[test]
    fn test_create_element_on_missing_list() {
        let ums = Ums::new(test_config()).unwrap();
        let result = ums.create_completion_element(ListId::new(404), |_me| 0);
        assert!(matches!(result, Err(UmsError::NotFound)));
        assert!(ums.wait_children().is_empty());
    }

    #[test]
    fn test_handle_ops_without_role() {
        let ums = Ums::new(test_config()).unwrap();
        let h = ums.handle();
        assert!(h.current_list().is_none());
        assert!(matches!(h.yield_now(), Err(UmsError::Unauthorized)));
    }
}
