//! Thread-local role and context binding
//!
//! Every OS thread that enters the runtime gets a role: carrier (it
//! registered a worker) or element (it backs a completion element).
//! Authorization checks in exec/yield/remove read the role instead of
//! trusting caller-supplied ids.

use std::cell::Cell;
use umsched_core::constants::ELEM_NONE;
use umsched_core::id::{ElemId, SchedId};

/// Slot value meaning "not bound to a context"
pub const SLOT_NONE: u32 = u32::MAX;

thread_local! {
    /// Scheduler this thread registered as a carrier (NONE if not a carrier)
    static CARRIER_SCHED: Cell<u32> = const { Cell::new(u32::MAX) };

    /// CPU the carrier registered for
    static CARRIER_CPU: Cell<usize> = const { Cell::new(usize::MAX) };

    /// Completion element this thread backs (NONE if not an element)
    static ELEMENT_ID: Cell<u32> = const { Cell::new(ELEM_NONE) };

    /// Context table slot bound to this thread
    static CONTEXT_SLOT: Cell<u32> = const { Cell::new(SLOT_NONE) };
}

/// Mark the calling thread as a carrier for `sched` on `cpu`
#[inline]
pub fn set_carrier(sched: SchedId, cpu: usize) {
    CARRIER_SCHED.with(|cell| cell.set(sched.as_u32()));
    CARRIER_CPU.with(|cell| cell.set(cpu));
    ELEMENT_ID.with(|cell| cell.set(ELEM_NONE));
}

/// Mark the calling thread as the backing thread of `elem`
#[inline]
pub fn set_element(elem: ElemId) {
    ELEMENT_ID.with(|cell| cell.set(elem.as_u32()));
    CARRIER_SCHED.with(|cell| cell.set(u32::MAX));
    CARRIER_CPU.with(|cell| cell.set(usize::MAX));
}

/// Drop any role from the calling thread
#[inline]
pub fn clear_role() {
    CARRIER_SCHED.with(|cell| cell.set(u32::MAX));
    CARRIER_CPU.with(|cell| cell.set(usize::MAX));
    ELEMENT_ID.with(|cell| cell.set(ELEM_NONE));
}

/// Scheduler id if the calling thread is a carrier
#[inline]
pub fn carrier_sched() -> Option<SchedId> {
    let raw = CARRIER_SCHED.with(|cell| cell.get());
    if raw == u32::MAX {
        None
    } else {
        Some(SchedId::new(raw))
    }
}

/// CPU if the calling thread is a carrier
#[inline]
pub fn carrier_cpu() -> Option<usize> {
    let cpu = CARRIER_CPU.with(|cell| cell.get());
    if cpu == usize::MAX {
        None
    } else {
        Some(cpu)
    }
}

/// Element id if the calling thread backs a completion element
#[inline]
pub fn current_element() -> Option<ElemId> {
    let raw = ELEMENT_ID.with(|cell| cell.get());
    if raw == ELEM_NONE {
        None
    } else {
        Some(ElemId::new(raw))
    }
}

#[inline]
pub fn is_carrier() -> bool {
    CARRIER_SCHED.with(|cell| cell.get()) != u32::MAX
}

#[inline]
pub fn is_element() -> bool {
    ELEMENT_ID.with(|cell| cell.get()) != ELEM_NONE
}

/// Bind the calling thread to a context table slot
#[inline]
pub fn set_context_slot(slot: u32) {
    CONTEXT_SLOT.with(|cell| cell.set(slot));
}

/// Context slot bound to the calling thread, if any
#[inline]
pub fn context_slot() -> Option<u32> {
    let slot = CONTEXT_SLOT.with(|cell| cell.get());
    if slot == SLOT_NONE {
        None
    } else {
        Some(slot)
    }
}

/// Unbind the calling thread from its context slot
#[inline]
pub fn clear_context_slot() {
    CONTEXT_SLOT.with(|cell| cell.set(SLOT_NONE));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_are_exclusive() {
        clear_role();
        assert!(!is_carrier());
        assert!(!is_element());

        set_carrier(SchedId::new(3), 1);
        assert!(is_carrier());
        assert_eq!(carrier_sched(), Some(SchedId::new(3)));
        assert_eq!(carrier_cpu(), Some(1));
        assert_eq!(current_element(), None);

        set_element(ElemId::new(9));
        assert!(is_element());
        assert!(!is_carrier());
        assert_eq!(current_element(), Some(ElemId::new(9)));
        assert_eq!(carrier_sched(), None);

        clear_role();
        assert!(!is_element());
    }

    #[test]
    fn test_context_slot_binding() {
        clear_context_slot();
        assert_eq!(context_slot(), None);

        set_context_slot(7);
        assert_eq!(context_slot(), Some(7));

        clear_context_slot();
        assert_eq!(context_slot(), None);
    }
}
