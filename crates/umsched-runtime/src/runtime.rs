//! Runtime object and scheduling operations
//!
//! One `Runtime` owns the registries for lists, elements and schedulers,
//! the context table, and the id generators. All control-plane operations
//! are methods here; the data types themselves live in `complist` and
//! `sched`.
//!
//! Lock order, outermost first: list entry, then element entry. Scheduler
//! entries are only held briefly and never while acquiring either of the
//! others. No registry guard is ever held across a park.
//!
//! Switch handshake: the dispatching side claims the element (host set,
//! still under reservation) before resuming its backing thread, and the
//! element validates both on wake. A permit that arrives without that
//! claim in place is absorbed by parking again, so a stale resume can
//! never start an element.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use umsched_core::id::{ElemId, IdGen, ListId, SchedId};
use umsched_core::{
    kdebug, kinfo, kwarn, ContextSwitch, ElemState, InterruptFlag, SavedContext, UmsError,
    UmsResult,
};

use crate::complist::{CompletionElement, CompletionList, ElemInfo, ListInfo, ReservationBatch, WorkerRef};
use crate::config::UmsConfig;
use crate::context_table::ContextTable;
use crate::parking::{ContextParking, PlatformWaitPoint};
use crate::platform;
use crate::registry::IdRegistry;
use crate::sched::{SchedInfo, Scheduler, Worker, WorkerInfo};
use crate::tls;

/// User-mode scheduling runtime
pub struct Runtime {
    config: UmsConfig,
    contexts: ContextTable,

    lists: IdRegistry<ListId, CompletionList>,
    elems: IdRegistry<ElemId, CompletionElement>,
    scheds: IdRegistry<SchedId, Scheduler>,

    list_ids: IdGen,
    elem_ids: IdGen,
    sched_ids: IdGen,
}

impl Runtime {
    pub fn new(config: UmsConfig) -> UmsResult<Self> {
        if let Err(e) = config.validate() {
            kwarn!("rejecting runtime config: {}", e);
            return Err(UmsError::InvariantViolation);
        }
        if config.debug_logging {
            config.print();
        }
        Ok(Self {
            contexts: ContextTable::new(config.max_contexts),
            lists: IdRegistry::new(),
            elems: IdRegistry::new(),
            scheds: IdRegistry::new(),
            list_ids: IdGen::new(),
            elem_ids: IdGen::new(),
            sched_ids: IdGen::new(),
            config,
        })
    }

    pub fn config(&self) -> &UmsConfig {
        &self.config
    }

    /// Live execution contexts (carriers plus elements)
    pub fn contexts_live(&self) -> usize {
        self.contexts.live()
    }

    // ------------------------------------------------------------------
    // Completion lists
    // ------------------------------------------------------------------

    pub fn create_list(&self) -> UmsResult<ListId> {
        let id = ListId::new(self.list_ids.next());
        self.lists.add(id, CompletionList::new(id))?;
        kdebug!("created completion list {}", id);
        Ok(id)
    }

    pub fn list_exists(&self, list: ListId) -> bool {
        self.lists.contains(list)
    }

    /// Destroy an empty completion list
    ///
    /// Lists normally die when their last element is removed; this is the
    /// explicit path for lists that never got elements. A list that still
    /// has members is refused.
    pub fn remove_list(&self, list: ListId) -> UmsResult<()> {
        let sched_ids = {
            let guard = self.lists.find(list)?;
            if guard.member_count() > 0 {
                return Err(UmsError::InvariantViolation);
            }
            guard.close();
            guard.scheduler_ids()
        };
        for sched in sched_ids {
            match self.remove_scheduler(sched) {
                Ok(()) | Err(UmsError::NotFound) | Err(UmsError::Gone) => {}
                Err(e) => kwarn!("scheduler {} teardown during list removal: {}", sched, e),
            }
        }
        self.lists.remove(list).map(|_| ())?;
        kinfo!("completion list {} destroyed", list);
        Ok(())
    }

    pub fn list_info(&self, list: ListId) -> UmsResult<ListInfo> {
        Ok(self.lists.find(list)?.snapshot())
    }

    // ------------------------------------------------------------------
    // Completion elements
    // ------------------------------------------------------------------

    /// Register the calling thread as a new completion element of `list`
    ///
    /// Runs on the element's backing thread. On return the element is
    /// published in the ready queue and the thread is expected to call
    /// `park_until_hosted` to hand itself over to the dispatchers.
    pub fn register_element(&self, list: ListId) -> UmsResult<ElemId> {
        if tls::is_carrier() || tls::is_element() {
            return Err(UmsError::InvariantViolation);
        }

        let guard = self.lists.find(list)?;
        let ctx = self.contexts.bind_current()?;
        let id = ElemId::new(self.elem_ids.next());

        if let Err(e) = self.elems.add(id, CompletionElement::new(id, list, ctx)) {
            self.contexts.release_current();
            return Err(e);
        }

        guard.add_member(id);
        tls::set_element(id);
        guard.enqueue_ready(id);
        drop(guard);

        kdebug!("element {} registered on list {}", id, list);
        Ok(id)
    }

    /// Park the calling element thread until a dispatcher switches it in
    ///
    /// Absorbs stale resume permits: a wake only counts once a dispatcher
    /// has claimed the element (reservation and host both set). Completes
    /// the switch (sibling release, Running transition) before returning.
    pub fn park_until_hosted(&self, elem: ElemId) -> UmsResult<()> {
        loop {
            self.contexts.suspend()?;
            let claimed = {
                let guard = self.elems.find(elem)?;
                guard.reservation.is_some() && guard.host.is_some()
            };
            if claimed {
                return self.finish_switch_in(elem);
            }
            kdebug!("element {}: spurious wake absorbed", elem);
        }
    }

    /// Complete a switch-in on the element's own thread
    ///
    /// Takes the reservation batch, returns the unrun siblings to ready,
    /// then transitions to Running. Sibling release happens first, so the
    /// batch is fully disbanded before this element starts executing.
    fn finish_switch_in(&self, elem: ElemId) -> UmsResult<()> {
        let (batch, owner) = self
            .elems
            .with_write(elem, |e| (e.reservation.take(), e.owner))?;
        let batch = batch.ok_or(UmsError::InvariantViolation)?;

        let siblings = batch.take_siblings(elem);
        if !siblings.is_empty() {
            let list = self.lists.find(owner)?;
            for sib in siblings {
                self.release_to_ready(&list, sib);
            }
        }

        self.elems.with_write(elem, |e| {
            e.state.set(ElemState::Running);
            e.stats.switched_in(platform::now_ns());
        })?;
        Ok(())
    }

    /// Return one unrun batch sibling to the ready queue
    fn release_to_ready(&self, list: &CompletionList, sib: ElemId) {
        let released = self.elems.with_write(sib, |e| {
            if e.state.get() == ElemState::Reserved {
                e.reservation = None;
                e.state.set(ElemState::Ready);
                true
            } else {
                false
            }
        });
        match released {
            Ok(true) => list.enqueue_ready(sib),
            Ok(false) => kwarn!("element {} no longer reserved at batch release", sib),
            Err(e) => kwarn!("element {} vanished at batch release: {}", sib, e),
        }
    }

    /// Remove a completion element
    ///
    /// Only the element's own backing thread may call this; it is its exit
    /// protocol. Removing the last member destroys the list and cascades
    /// into every attached scheduler. The hosting carrier is resumed so
    /// its `exec` returns.
    pub fn remove_element(&self, elem: ElemId) -> UmsResult<()> {
        if tls::current_element() != Some(elem) {
            return Err(UmsError::Unauthorized);
        }
        let now = platform::now_ns();
        let (owner, host) = {
            let guard = self.elems.find(elem)?;
            (guard.owner, guard.host)
        };

        // Unlink from the list; emptying it triggers teardown
        let cascade = {
            let list = self.lists.find(owner)?;
            let (removed, now_empty) = list.remove_member(elem);
            if !removed {
                kwarn!("element {} missing from members of {}", elem, owner);
            }
            if now_empty {
                // No new reservations once the last element is leaving
                list.close();
                Some(list.scheduler_ids())
            } else {
                None
            }
        };

        self.elems.with_write(elem, |e| {
            e.state.set(ElemState::Destroyed);
            e.stats.switched_out(now);
            e.host = None;
            e.reservation = None;
        })?;
        // Blocks until concurrent readers of this element drop out
        self.elems.remove(elem)?;

        if let Some(sched_ids) = cascade {
            for sched in sched_ids {
                match self.remove_scheduler(sched) {
                    Ok(()) | Err(UmsError::NotFound) | Err(UmsError::Gone) => {}
                    Err(e) => kwarn!("cascade teardown of scheduler {}: {}", sched, e),
                }
            }
            match self.lists.remove(owner) {
                Ok(_) => kinfo!("completion list {} destroyed", owner),
                Err(e) => kwarn!("list {} teardown: {}", owner, e),
            }
        }

        // Hand the carrier back its loop. After a cascade the scheduler is
        // gone and its carriers were already interrupted; the lookup
        // failing is the expected shape of that race.
        if let Some(host) = host {
            self.with_worker(host, |w| {
                w.state.stop_running(now);
                if let Err(e) = self.contexts.resume(w.entry_context()) {
                    kdebug!("remove {}: carrier entry context stale: {}", elem, e);
                }
            });
        }

        tls::clear_role();
        self.contexts.release_current();
        kdebug!("element {} removed", elem);
        Ok(())
    }

    pub fn element_info(&self, elem: ElemId) -> UmsResult<ElemInfo> {
        Ok(self.elems.find(elem)?.snapshot())
    }

    // ------------------------------------------------------------------
    // Reservation
    // ------------------------------------------------------------------

    /// Reserve up to `want` ready elements from `list`
    ///
    /// Blocks for the first element; takes more only if immediately
    /// available. The list entry is held read-locked for the whole call,
    /// so teardown serializes behind in-flight reservations.
    pub fn reserve(&self, list: ListId, want: u32) -> UmsResult<Vec<ElemId>> {
        if want == 0 {
            return Err(UmsError::InvariantViolation);
        }
        let flag = self.current_interrupt_flag();

        let guard = self.lists.find(list)?;
        let ids = guard.reserve_ids(want, &flag)?;

        let batch = Arc::new(ReservationBatch::new(ids.clone()));
        for &eid in &ids {
            let res = self.elems.with_write(eid, |e| {
                e.state.set(ElemState::Reserved);
                e.reservation = Some(Arc::clone(&batch));
            });
            if let Err(e) = res {
                kwarn!("reserved element {} vanished: {}", eid, e);
            }
        }
        drop(guard);

        kdebug!("reserved {} element(s) from {}", ids.len(), list);
        Ok(ids)
    }

    /// Interrupt source for blocking waits on the calling thread
    ///
    /// Carriers use their worker's flag so scheduler teardown can reach
    /// them; any other thread gets a flag that never fires.
    fn current_interrupt_flag(&self) -> InterruptFlag {
        let (Some(sched), Some(cpu)) = (tls::carrier_sched(), tls::carrier_cpu()) else {
            return InterruptFlag::dummy();
        };
        match self.scheds.find(sched) {
            Ok(guard) => guard
                .worker(cpu)
                .map(|w| w.interrupt.clone())
                .unwrap_or_else(InterruptFlag::dummy),
            Err(_) => InterruptFlag::dummy(),
        }
    }

    // ------------------------------------------------------------------
    // Schedulers and workers
    // ------------------------------------------------------------------

    pub fn create_scheduler(&self, list: ListId) -> UmsResult<SchedId> {
        let guard = self.lists.find(list)?;
        let id = SchedId::new(self.sched_ids.next());
        self.scheds
            .add(id, Scheduler::new(id, list, self.config.num_cpus))?;
        guard.attach_scheduler(id);
        drop(guard);
        kdebug!("scheduler {} created on list {}", id, list);
        Ok(id)
    }

    /// Tear down a scheduler
    ///
    /// Interrupts every bound carrier (blocked in reserve or parked in
    /// exec), wakes all wait() callers, and detaches from the list. Safe
    /// against concurrent dispatch: removal blocks until brief readers
    /// drop, and carriers observe the interrupt at their next wake check.
    pub fn remove_scheduler(&self, sched: SchedId) -> UmsResult<()> {
        let owned = self.scheds.remove(sched)?;

        // Flag first, then wake, so every blocked carrier re-checks
        for worker in owned.workers() {
            worker.interrupt.set();
            if let Err(e) = self.contexts.resume(worker.entry_context()) {
                kdebug!(
                    "teardown {}: worker cpu {} entry context stale: {}",
                    sched,
                    worker.cpu,
                    e
                );
            }
        }

        // Carriers blocked in reserve sit on the list semaphore
        match self.lists.find(owned.list) {
            Ok(list) => {
                list.kick_reservers();
                list.detach_scheduler(sched);
            }
            // List already under teardown; the cascade owns the cleanup
            Err(_) => {}
        }

        for point in owned.drain_waiters() {
            point.grant();
        }

        kinfo!("scheduler {} removed", sched);
        Ok(())
    }

    /// Block until the scheduler is torn down
    pub fn wait_scheduler(&self, sched: SchedId) -> UmsResult<()> {
        let point = Arc::new(PlatformWaitPoint::new());
        {
            let guard = self.scheds.find(sched)?;
            guard.add_waiter(Arc::clone(&point));
        }
        point.wait();
        Ok(())
    }

    pub fn sched_info(&self, sched: SchedId) -> UmsResult<SchedInfo> {
        Ok(self.scheds.find(sched)?.snapshot())
    }

    /// Snapshot of one bound worker; `NotFound` for an unbound slot
    pub fn worker_info(&self, sched: SchedId, cpu: usize) -> UmsResult<WorkerInfo> {
        let guard = self.scheds.find(sched)?;
        let worker = guard.worker(cpu).ok_or(UmsError::NotFound)?;
        Ok(worker.snapshot())
    }

    /// Register the calling OS thread as the carrier for its CPU
    ///
    /// The thread should already be pinned; the CPU it runs on picks the
    /// worker slot. Captures the carrier's dispatch-loop context.
    pub fn register_worker(&self, sched: SchedId) -> UmsResult<usize> {
        let cpu = {
            let guard = self.scheds.find(sched)?;
            platform::current_cpu() % guard.num_slots()
        };
        self.register_worker_on(sched, cpu)
    }

    /// Register the calling OS thread as the carrier for an explicit slot
    ///
    /// For spawners that assign slots themselves, including setups where
    /// CPU pinning is disabled and the running CPU says nothing about the
    /// intended slot.
    pub fn register_worker_on(&self, sched: SchedId, cpu: usize) -> UmsResult<usize> {
        if tls::is_carrier() || tls::is_element() {
            return Err(UmsError::InvariantViolation);
        }

        let guard = self.scheds.find(sched)?;
        if cpu >= guard.num_slots() {
            return Err(UmsError::InvariantViolation);
        }

        let ctx = self.contexts.bind_current()?;
        let worker = Arc::new(Worker::new(cpu));
        worker.set_entry_context(ctx);
        worker
            .state
            .thread_id
            .store(platform::thread_id(), Ordering::Relaxed);

        if let Err(e) = guard.bind_worker(worker) {
            drop(guard);
            self.contexts.release_current();
            return Err(e);
        }
        drop(guard);

        tls::set_carrier(sched, cpu);
        kinfo!("worker registered: scheduler {} cpu {}", sched, cpu);
        Ok(cpu)
    }

    /// Drop the calling carrier's role and context binding
    ///
    /// Called when the carrier loop exits. The worker slot itself stays
    /// bound; slots live and die with their scheduler.
    pub fn unregister_current_worker(&self) {
        if tls::is_carrier() {
            tls::clear_role();
            self.contexts.release_current();
        }
    }

    // ------------------------------------------------------------------
    // Exec / yield
    // ------------------------------------------------------------------

    /// Switch execution to a reserved element
    ///
    /// From a carrier: parks the carrier until the element yields back or
    /// is removed (`Ok`), or the scheduler is torn down (`Err(Gone)`).
    /// From a hosted element: stores and requeues the caller, enters the
    /// target on the same worker, and returns once the caller is next
    /// switched in.
    pub fn exec(&self, target: ElemId) -> UmsResult<()> {
        let now = platform::now_ns();
        if let Some(displaced) = tls::current_element() {
            return self.exec_from_element(displaced, target, now);
        }
        let (Some(sched), Some(cpu)) = (tls::carrier_sched(), tls::carrier_cpu()) else {
            return Err(UmsError::Unauthorized);
        };
        self.exec_from_carrier(sched, cpu, target, now)
    }

    fn exec_from_carrier(
        &self,
        sched: SchedId,
        cpu: usize,
        target: ElemId,
        now: u64,
    ) -> UmsResult<()> {
        let worker = match self.worker_for(sched, cpu) {
            Ok(w) => w,
            // Scheduler torn down between reserve and exec: nothing in the
            // batch has run, so hand the whole batch back to the list
            Err(e) => {
                self.abandon_batch(target);
                return Err(e);
            }
        };

        // Keep the loop context fresh; covers exec as the first call
        // after registration
        worker.set_entry_context(self.contexts.capture()?);

        self.switch_to(&worker, WorkerRef { sched, cpu }, target, now)?;

        // Park until the hosted element leaves. The flag check inside the
        // wait makes teardown win over any pending permit.
        let flag = worker.interrupt.clone();
        worker.state.is_parked.store(true, Ordering::Release);
        let result = loop {
            match self.contexts.suspend_interruptible(&flag) {
                Ok(()) => {}
                Err(UmsError::Interrupted) => break Err(UmsError::Gone),
                Err(e) => break Err(e),
            }
            if worker.state.is_idle() {
                break Ok(());
            }
            kdebug!("carrier {}:{}: spurious wake absorbed", sched, cpu);
        };
        worker.state.is_parked.store(false, Ordering::Release);
        result
    }

    fn exec_from_element(&self, displaced: ElemId, target: ElemId, now: u64) -> UmsResult<()> {
        if displaced == target {
            return Err(UmsError::InvariantViolation);
        }
        let (owner, host) = {
            let guard = self.elems.find(displaced)?;
            (guard.owner, guard.host)
        };
        let href = host.ok_or(UmsError::InvariantViolation)?;
        let worker = match self.worker_for(href.sched, href.cpu) {
            Ok(w) => w,
            Err(e) => {
                self.abandon_batch(target);
                return Err(e);
            }
        };

        // Claim before displacing anything; a refused target leaves the
        // caller hosted and running as if the call never happened
        let target_ctx = self.claim_reserved(href, target, now)?;

        // The displaced element leaves first; a worker never hosts two
        {
            let list = self.lists.find(owner)?;
            let ctx = self.contexts.capture()?;
            self.elems.with_write(displaced, |e| {
                e.context = ctx;
                e.stats.switched_out(now);
                e.host = None;
                e.state.set(ElemState::Ready);
            })?;
            list.enqueue_ready(displaced);
        }

        // The displaced hosting is complete even though the carrier never
        // woke in between
        worker.state.n_dispatches.fetch_add(1, Ordering::Relaxed);
        worker.state.start_running(target, now);

        if let Err(e) = self.contexts.resume(target_ctx) {
            kwarn!("handoff to {} failed after displacement: {}", target, e);
            worker.state.stop_running(now);
            let _ = self.elems.with_write(target, |el| {
                el.host = None;
            });
            return Err(e);
        }

        self.park_until_hosted(displaced)
    }

    fn worker_for(&self, sched: SchedId, cpu: usize) -> UmsResult<Arc<Worker>> {
        let guard = self.scheds.find(sched)?;
        guard.worker(cpu).ok_or(UmsError::InvariantViolation)
    }

    /// Return a never-entered reservation batch to the ready queue
    ///
    /// Only valid while no member has been switched in; the caller is then
    /// the batch's sole owner and nobody else can reserve its members.
    fn abandon_batch(&self, target: ElemId) {
        let (owner, batch) = match self.elems.find(target) {
            Ok(guard) => (guard.owner, guard.reservation.clone()),
            Err(_) => return,
        };
        let Some(batch) = batch else {
            return;
        };
        let members = batch.take_all();
        if members.is_empty() {
            return;
        }
        match self.lists.find(owner) {
            Ok(list) => {
                for m in members {
                    self.release_to_ready(&list, m);
                }
                kdebug!("abandoned reservation batch returned to {}", owner);
            }
            Err(e) => kdebug!("batch abandon: list {} unavailable: {}", owner, e),
        }
    }

    /// Claim `target` for `href`: host set while still reserved
    ///
    /// The claim is what the element's wake validation looks for. Refuses
    /// elements that are not reserved or already claimed, so two
    /// dispatchers can never host the same element.
    fn claim_reserved(
        &self,
        href: WorkerRef,
        target: ElemId,
        now: u64,
    ) -> UmsResult<SavedContext> {
        self.elems.with_write(target, |e| {
            if e.state.get() == ElemState::Reserved && e.reservation.is_some() && e.host.is_none()
            {
                e.host = Some(href);
                e.stats.switch_started(now);
                Ok(e.context)
            } else {
                Err(UmsError::InvariantViolation)
            }
        })?
    }

    /// Claim `target` and wake its backing thread
    fn switch_to(
        &self,
        worker: &Arc<Worker>,
        href: WorkerRef,
        target: ElemId,
        now: u64,
    ) -> UmsResult<()> {
        let target_ctx = self.claim_reserved(href, target, now)?;

        worker.state.start_running(target, now);

        if let Err(e) = self.contexts.resume(target_ctx) {
            // Roll the claim back so the worker is not hosting a ghost
            worker.state.stop_running(now);
            let _ = self.elems.with_write(target, |el| {
                el.host = None;
            });
            return Err(e);
        }
        Ok(())
    }

    /// Yield the calling thread's hosting back to its carrier
    ///
    /// From a hosted element: stores context, requeues, resumes the
    /// carrier and parks; returns when next switched in. From a carrier
    /// with nothing hosted: no-op. From any other thread: Unauthorized.
    pub fn yield_current(&self) -> UmsResult<()> {
        if let Some(elem) = tls::current_element() {
            return self.yield_element(elem);
        }
        if tls::is_carrier() {
            return Ok(());
        }
        Err(UmsError::Unauthorized)
    }

    fn yield_element(&self, elem: ElemId) -> UmsResult<()> {
        let now = platform::now_ns();
        let (owner, host) = {
            let guard = self.elems.find(elem)?;
            (guard.owner, guard.host)
        };
        // The backing thread only runs while hosted
        let href = host.ok_or(UmsError::InvariantViolation)?;

        // Store and requeue: dual of reserve
        {
            let list = self.lists.find(owner)?;
            let ctx = self.contexts.capture()?;
            self.elems.with_write(elem, |e| {
                e.context = ctx;
                e.stats.switched_out(now);
                e.host = None;
                e.state.set(ElemState::Ready);
            })?;
            list.enqueue_ready(elem);
        }

        // Hand the carrier back its loop
        self.with_worker(href, |w| {
            w.state.stop_running(now);
            if let Err(e) = self.contexts.resume(w.entry_context()) {
                kdebug!("yield {}: carrier entry context stale: {}", elem, e);
            }
        });

        self.park_until_hosted(elem)
    }

    /// List the calling thread is operating against, if any
    pub fn current_list(&self) -> Option<ListId> {
        if let Some(elem) = tls::current_element() {
            return self.elems.find(elem).ok().map(|g| g.owner);
        }
        if let Some(sched) = tls::carrier_sched() {
            return self.scheds.find(sched).ok().map(|g| g.list);
        }
        None
    }

    /// Apply `f` to a live worker, skipping quietly if its scheduler is
    /// already gone
    fn with_worker(&self, href: WorkerRef, f: impl FnOnce(&Worker)) {
        match self.scheds.find(href.sched) {
            Ok(guard) => match guard.worker(href.cpu) {
                Some(worker) => f(&worker),
                None => kwarn!("worker slot {} empty on scheduler {}", href.cpu, href.sched),
            },
            Err(e) => kdebug!("scheduler {} unavailable: {}", href.sched, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn small_runtime() -> Arc<Runtime> {
        let config = UmsConfig::new()
            .num_cpus(1)
            .max_contexts(16)
            .pin_carriers(false);
        Arc::new(Runtime::new(config).unwrap())
    }

    #[test]
    fn test_list_lifecycle() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();
        assert!(rt.list_exists(list));

        let info = rt.list_info(list).unwrap();
        assert_eq!(info.members, 0);
        assert_eq!(info.ready, 0);

        rt.remove_list(list).unwrap();
        assert!(!rt.list_exists(list));
        assert!(matches!(rt.list_info(list), Err(UmsError::NotFound)));
    }

    #[test]
    fn test_scheduler_attach_detach() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();
        let sched = rt.create_scheduler(list).unwrap();

        assert_eq!(rt.list_info(list).unwrap().schedulers, 1);
        let info = rt.sched_info(sched).unwrap();
        assert_eq!(info.list, list);
        assert_eq!(info.slots, 1);
        assert!(info.workers.is_empty());

        rt.remove_scheduler(sched).unwrap();
        assert!(matches!(rt.sched_info(sched), Err(UmsError::NotFound)));
        assert_eq!(rt.list_info(list).unwrap().schedulers, 0);
    }

    #[test]
    fn test_remove_list_cascades_schedulers() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();
        let sched = rt.create_scheduler(list).unwrap();

        rt.remove_list(list).unwrap();
        assert!(matches!(rt.sched_info(sched), Err(UmsError::NotFound)));
    }

    #[test]
    fn test_create_scheduler_on_missing_list() {
        let rt = small_runtime();
        assert!(matches!(
            rt.create_scheduler(ListId::new(999)),
            Err(UmsError::NotFound)
        ));
    }

    #[test]
    fn test_wait_scheduler_woken_by_teardown() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();
        let sched = rt.create_scheduler(list).unwrap();

        let rt2 = Arc::clone(&rt);
        let waiter = thread::spawn(move || rt2.wait_scheduler(sched));

        thread::sleep(Duration::from_millis(50));
        rt.remove_scheduler(sched).unwrap();

        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn test_register_worker_and_slot_conflict() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();
        let sched = rt.create_scheduler(list).unwrap();

        let rt2 = Arc::clone(&rt);
        let first = thread::spawn(move || {
            let cpu = rt2.register_worker(sched)?;
            // One slot configured, so this thread owns slot 0
            assert_eq!(cpu, 0);
            rt2.unregister_current_worker();
            Ok::<_, UmsError>(())
        })
        .join()
        .unwrap();
        assert!(first.is_ok());

        let winfo = rt.worker_info(sched, 0).unwrap();
        assert_eq!(winfo.cpu, 0);
        assert!(winfo.current_element.is_none());
        assert!(matches!(rt.worker_info(sched, 1), Err(UmsError::NotFound)));

        // Slot 0 is already bound
        let rt3 = Arc::clone(&rt);
        let second = thread::spawn(move || {
            let r = rt3.register_worker(sched);
            rt3.unregister_current_worker();
            r
        })
        .join()
        .unwrap();
        assert!(matches!(second, Err(UmsError::AlreadyRegistered)));
    }

    #[test]
    fn test_teardown_interrupts_blocked_reserver() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();
        let sched = rt.create_scheduler(list).unwrap();

        let rt2 = Arc::clone(&rt);
        let carrier = thread::spawn(move || {
            rt2.register_worker(sched).unwrap();
            // Empty queue: blocks until teardown reaches in
            let r = rt2.reserve(list, 2);
            rt2.unregister_current_worker();
            r
        });

        thread::sleep(Duration::from_millis(80));
        rt.remove_scheduler(sched).unwrap();

        assert!(matches!(
            carrier.join().unwrap(),
            Err(UmsError::Interrupted)
        ));
    }

    #[test]
    fn test_lost_scheduler_returns_batch_to_ready() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();
        let sched = rt.create_scheduler(list).unwrap();

        for _ in 0..2 {
            let rt2 = Arc::clone(&rt);
            thread::spawn(move || rt2.register_element(list))
                .join()
                .unwrap()
                .unwrap();
        }

        let (ids_tx, ids_rx) = std::sync::mpsc::channel();
        let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();
        let rt2 = Arc::clone(&rt);
        let carrier = thread::spawn(move || {
            rt2.register_worker(sched).unwrap();
            let ids = rt2.reserve(list, 2).unwrap();
            ids_tx.send(ids.clone()).unwrap();
            // Scheduler is removed while we hold the batch
            go_rx.recv().unwrap();
            let r = rt2.exec(ids[0]);
            rt2.unregister_current_worker();
            r
        });

        let ids = ids_rx.recv().unwrap();
        assert_eq!(ids.len(), 2);
        rt.remove_scheduler(sched).unwrap();
        go_tx.send(()).unwrap();

        assert!(matches!(
            carrier.join().unwrap(),
            Err(UmsError::NotFound)
        ));

        // The never-entered batch went back to ready, reservable again
        assert_eq!(rt.list_info(list).unwrap().ready, 2);
        for &e in &ids {
            assert_eq!(rt.element_info(e).unwrap().state, ElemState::Ready);
        }
    }

    #[test]
    fn test_element_registration_publishes_ready() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();

        let rt2 = Arc::clone(&rt);
        let elem = thread::spawn(move || rt2.register_element(list))
            .join()
            .unwrap()
            .unwrap();

        let info = rt.list_info(list).unwrap();
        assert_eq!(info.members, 1);
        assert_eq!(info.ready, 1);

        let einfo = rt.element_info(elem).unwrap();
        assert_eq!(einfo.owner, list);
        assert_eq!(einfo.state, ElemState::Ready);
        assert!(einfo.host.is_none());

        // Non-empty list removal is refused while the member exists
        assert!(matches!(
            rt.remove_list(list),
            Err(UmsError::InvariantViolation)
        ));
    }

    #[test]
    fn test_reserve_marks_reserved_and_batches() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();

        for _ in 0..3 {
            let rt2 = Arc::clone(&rt);
            thread::spawn(move || rt2.register_element(list))
                .join()
                .unwrap()
                .unwrap();
        }

        // Plain thread may reserve (list creators dispatch too)
        let ids = rt.reserve(list, 2).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(rt.list_info(list).unwrap().ready, 1);
        for &e in &ids {
            assert_eq!(rt.element_info(e).unwrap().state, ElemState::Reserved);
        }

        let rest = rt.reserve(list, 5).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rt.list_info(list).unwrap().ready, 0);
    }

    #[test]
    fn test_exec_unreserved_element_refused() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();
        let sched = rt.create_scheduler(list).unwrap();

        let rt2 = Arc::clone(&rt);
        let elem = thread::spawn(move || rt2.register_element(list))
            .join()
            .unwrap()
            .unwrap();

        let rt3 = Arc::clone(&rt);
        let result = thread::spawn(move || {
            rt3.register_worker(sched).unwrap();
            // Ready but not reserved: the claim must be refused
            let r = rt3.exec(elem);
            rt3.unregister_current_worker();
            r
        })
        .join()
        .unwrap();
        assert!(matches!(result, Err(UmsError::InvariantViolation)));
    }

    #[test]
    fn test_exec_and_yield_without_role() {
        let rt = small_runtime();
        assert!(matches!(
            rt.exec(ElemId::new(1)),
            Err(UmsError::Unauthorized)
        ));
        assert!(matches!(rt.yield_current(), Err(UmsError::Unauthorized)));
    }

    #[test]
    fn test_yield_idle_carrier_is_noop() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();
        let sched = rt.create_scheduler(list).unwrap();

        let rt2 = Arc::clone(&rt);
        let result = thread::spawn(move || {
            rt2.register_worker(sched).unwrap();
            let r = rt2.yield_current();
            rt2.unregister_current_worker();
            r
        })
        .join()
        .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_reserve_zero_refused() {
        let rt = small_runtime();
        let list = rt.create_list().unwrap();
        assert!(matches!(
            rt.reserve(list, 0),
            Err(UmsError::InvariantViolation)
        ));
    }
}
