//! Completion lists and completion elements
//!
//! A completion list owns a set of suspended logical threads (completion
//! elements) plus a FIFO ready queue gated by a counting semaphore. The
//! semaphore count always equals the queue length; elements in flight
//! (reserved or running) are in neither.
//!
//! Three locks, never nested inside each other:
//! - `ready` queue mutex, paired with the `slots` semaphore
//! - `members` mutex (element ownership)
//! - `schedulers` mutex (attached scheduler ids)
//!
//! Dispatch throughput only touches the queue lock; membership churn and
//! scheduler attach/detach stay off that path.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use umsched_core::id::{ElemId, ListId, SchedId};
use umsched_core::{
    kwarn, AtomicElemState, ElemState, ElemStats, ElemStatsSnapshot, InterruptFlag, SavedContext,
    UmsError, UmsResult,
};

use crate::sync::Semaphore;

/// Identifies the worker hosting an element: scheduler plus CPU slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerRef {
    pub sched: SchedId,
    pub cpu: usize,
}

/// Elements reserved together by one dispatch call
///
/// Ownership passes to whichever element is switched in first; it takes
/// the siblings out and returns them to ready before it starts running.
pub struct ReservationBatch {
    members: Mutex<Vec<ElemId>>,
}

impl ReservationBatch {
    pub fn new(members: Vec<ElemId>) -> Self {
        Self {
            members: Mutex::new(members),
        }
    }

    /// Take every member except `chosen`, emptying the batch
    pub fn take_siblings(&self, chosen: ElemId) -> Vec<ElemId> {
        let mut members = self.members.lock().unwrap();
        let siblings = members.iter().copied().filter(|&e| e != chosen).collect();
        members.clear();
        siblings
    }

    /// Take the whole batch, emptying it
    ///
    /// For dispatchers abandoning a batch no member of which has run.
    pub fn take_all(&self) -> Vec<ElemId> {
        std::mem::take(&mut *self.members.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.members.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().unwrap().is_empty()
    }
}

impl std::fmt::Debug for ReservationBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReservationBatch")
            .field(&*self.members.lock().unwrap())
            .finish()
    }
}

/// One suspended logical thread
///
/// The backing OS thread parks on the context in `context` whenever the
/// element is not running. `host` and `reservation` are only mutated
/// under the element's registry entry lock; `state` is atomic so the
/// wake-validation paths can read it without taking the entry lock.
pub struct CompletionElement {
    pub id: ElemId,
    pub owner: ListId,
    pub state: AtomicElemState,

    /// Context of the parked backing thread, fixed at creation
    pub context: SavedContext,

    /// Worker hosting this element while Running
    pub host: Option<WorkerRef>,

    /// Batch this element belongs to while Reserved
    pub reservation: Option<Arc<ReservationBatch>>,

    pub stats: ElemStats,
}

impl CompletionElement {
    pub fn new(id: ElemId, owner: ListId, context: SavedContext) -> Self {
        Self {
            id,
            owner,
            state: AtomicElemState::new(ElemState::Ready),
            context,
            host: None,
            reservation: None,
            stats: ElemStats::new(),
        }
    }

    pub fn snapshot(&self) -> ElemInfo {
        ElemInfo {
            id: self.id,
            owner: self.owner,
            state: self.state.get(),
            host: self.host,
            stats: self.stats.snapshot(),
        }
    }
}

/// Read-only view of one element
#[derive(Debug, Clone, Copy)]
pub struct ElemInfo {
    pub id: ElemId,
    pub owner: ListId,
    pub state: ElemState,
    pub host: Option<WorkerRef>,
    pub stats: ElemStatsSnapshot,
}

/// Container of completion elements with a FIFO ready queue
pub struct CompletionList {
    pub id: ListId,

    /// Ready elements, FIFO
    ready: Mutex<VecDeque<ElemId>>,

    /// One permit per entry in `ready`; closed at list teardown
    slots: Semaphore,

    /// Elements owned by this list
    members: Mutex<HashSet<ElemId>>,

    /// Schedulers attached to this list
    schedulers: Mutex<HashSet<SchedId>>,
}

impl CompletionList {
    pub fn new(id: ListId) -> Self {
        Self {
            id,
            ready: Mutex::new(VecDeque::new()),
            slots: Semaphore::new(0),
            members: Mutex::new(HashSet::new()),
            schedulers: Mutex::new(HashSet::new()),
        }
    }

    // --- ready queue ---

    /// Append an element to the ready queue
    ///
    /// Queue entry first, permit second, so a woken reserver always finds
    /// the element.
    pub fn enqueue_ready(&self, elem: ElemId) {
        self.ready.lock().unwrap().push_back(elem);
        self.slots.release(1);
    }

    fn pop_ready(&self) -> Option<ElemId> {
        self.ready.lock().unwrap().pop_front()
    }

    /// Reserve up to `want` ready elements, blocking for the first
    ///
    /// One permit is acquired interruptibly (this is the only blocking
    /// point), then up to `want - 1` more are taken only if immediately
    /// available. The result is FIFO order and never empty on success.
    pub fn reserve_ids(&self, want: u32, flag: &InterruptFlag) -> UmsResult<Vec<ElemId>> {
        if want == 0 {
            return Err(UmsError::InvariantViolation);
        }

        self.slots.acquire_interruptible(flag)?;
        let first = match self.pop_ready() {
            Some(e) => e,
            None => {
                // Permit without a queue entry means the pairing broke
                kwarn!("list {}: ready permit with empty queue", self.id);
                return Err(UmsError::InvariantViolation);
            }
        };

        let mut ids = Vec::with_capacity(want as usize);
        ids.push(first);

        while (ids.len() as u32) < want {
            if !self.slots.try_acquire() {
                break;
            }
            match self.pop_ready() {
                Some(e) => ids.push(e),
                None => {
                    kwarn!("list {}: ready permit with empty queue", self.id);
                    break;
                }
            }
        }

        Ok(ids)
    }

    /// Stop all reservations; blocked reservers wake with Gone
    pub fn close(&self) {
        self.slots.close();
    }

    /// Wake blocked reservers without granting permits
    pub fn kick_reservers(&self) {
        self.slots.wake_all();
    }

    // --- membership ---

    pub fn add_member(&self, elem: ElemId) {
        self.members.lock().unwrap().insert(elem);
    }

    /// Unlink an element; reports whether it was present and whether the
    /// list is now empty
    pub fn remove_member(&self, elem: ElemId) -> (bool, bool) {
        let mut members = self.members.lock().unwrap();
        let removed = members.remove(&elem);
        (removed, members.is_empty())
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().unwrap().len()
    }

    // --- schedulers ---

    pub fn attach_scheduler(&self, sched: SchedId) {
        self.schedulers.lock().unwrap().insert(sched);
    }

    pub fn detach_scheduler(&self, sched: SchedId) {
        self.schedulers.lock().unwrap().remove(&sched);
    }

    pub fn scheduler_ids(&self) -> Vec<SchedId> {
        self.schedulers.lock().unwrap().iter().copied().collect()
    }

    // --- introspection ---

    pub fn ready_len(&self) -> usize {
        self.ready.lock().unwrap().len()
    }

    pub fn snapshot(&self) -> ListInfo {
        ListInfo {
            id: self.id,
            ready: self.ready_len(),
            members: self.member_count(),
            schedulers: self.schedulers.lock().unwrap().len(),
        }
    }
}

/// Read-only view of one list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListInfo {
    pub id: ListId,
    pub ready: usize,
    pub members: usize,
    pub schedulers: usize,
}
