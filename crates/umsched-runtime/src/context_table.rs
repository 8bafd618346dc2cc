//! Execution context table
//!
//! Backs every `SavedContext` token. Each slot pairs a wait point with a
//! generation counter; release bumps the generation, so tokens minted
//! before a slot was recycled are rejected on resume instead of waking
//! an unrelated thread.
//!
//! Slot indices are recycled through a lock-free free list. The slot
//! vector only grows, so an index stays valid for the table's lifetime
//! and resume never touches freed memory.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use crossbeam_queue::ArrayQueue;
use umsched_core::{ContextSwitch, InterruptFlag, SavedContext, UmsError, UmsResult};

use crate::parking::{ContextParking, PlatformWaitPoint};
use crate::tls;

/// One suspended-thread slot
struct ContextSlot {
    /// Parks and wakes the bound thread
    point: PlatformWaitPoint,

    /// Bumped on release; resume validates tokens against it
    generation: AtomicU32,
}

/// Table of execution contexts for one runtime
pub struct ContextTable {
    /// Slot storage, grows on demand up to `capacity`
    slots: RwLock<Vec<Arc<ContextSlot>>>,

    /// Recycled slot indices
    free: ArrayQueue<u32>,

    /// Hard cap on live contexts
    capacity: usize,
}

impl ContextTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
            free: ArrayQueue::new(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Bind the calling thread to a fresh context slot
    ///
    /// Every thread that enters the scheduling world calls this exactly
    /// once. Fails with `Exhausted` when the table is at capacity and
    /// `InvariantViolation` if the thread is already bound.
    pub fn bind_current(&self) -> UmsResult<SavedContext> {
        if tls::context_slot().is_some() {
            return Err(UmsError::InvariantViolation);
        }

        let (idx, slot) = match self.free.pop() {
            Some(idx) => {
                let slot = self.slot_arc(idx)?;
                // Permits left by a late resume of the previous owner
                slot.point.reset();
                (idx, slot)
            }
            None => {
                let mut slots = self.slots.write().unwrap();
                if slots.len() >= self.capacity {
                    return Err(UmsError::Exhausted);
                }
                let idx = slots.len() as u32;
                let slot = Arc::new(ContextSlot {
                    point: PlatformWaitPoint::new(),
                    generation: AtomicU32::new(1),
                });
                slots.push(Arc::clone(&slot));
                (idx, slot)
            }
        };

        tls::set_context_slot(idx);
        Ok(SavedContext::new(idx, slot.generation.load(Ordering::Acquire)))
    }

    /// Unbind the calling thread and recycle its slot
    ///
    /// All outstanding tokens for the slot become stale.
    pub fn release_current(&self) {
        let Some(idx) = tls::context_slot() else {
            return;
        };
        if let Ok(slot) = self.slot_arc(idx) {
            slot.generation.fetch_add(1, Ordering::Release);
            let _ = self.free.push(idx);
        }
        tls::clear_context_slot();
    }

    /// Live contexts (bound slots)
    pub fn live(&self) -> usize {
        let allocated = self.slots.read().unwrap().len();
        allocated - self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot_arc(&self, idx: u32) -> UmsResult<Arc<ContextSlot>> {
        let slots = self.slots.read().unwrap();
        slots.get(idx as usize).cloned().ok_or(UmsError::Gone)
    }

    fn current_slot(&self) -> UmsResult<(u32, Arc<ContextSlot>)> {
        let idx = tls::context_slot().ok_or(UmsError::InvariantViolation)?;
        Ok((idx, self.slot_arc(idx)?))
    }
}

impl ContextSwitch for ContextTable {
    fn capture(&self) -> UmsResult<SavedContext> {
        let (idx, slot) = self.current_slot()?;
        Ok(SavedContext::new(idx, slot.generation.load(Ordering::Acquire)))
    }

    fn resume(&self, ctx: SavedContext) -> UmsResult<()> {
        if !ctx.is_valid() {
            return Err(UmsError::Gone);
        }
        let slot = self.slot_arc(ctx.slot())?;
        if slot.generation.load(Ordering::Acquire) != ctx.generation() {
            return Err(UmsError::Gone);
        }
        slot.point.grant();
        Ok(())
    }

    fn suspend(&self) -> UmsResult<()> {
        let (_, slot) = self.current_slot()?;
        slot.point.wait();
        Ok(())
    }

    fn suspend_interruptible(&self, flag: &InterruptFlag) -> UmsResult<()> {
        let (_, slot) = self.current_slot()?;
        slot.point.wait_interruptible(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_bind_capture_release() {
        let table = Arc::new(ContextTable::new(8));
        let table2 = Arc::clone(&table);

        thread::spawn(move || {
            let ctx = table2.bind_current().unwrap();
            assert!(ctx.is_valid());
            assert_eq!(table2.capture().unwrap(), ctx);
            assert_eq!(table2.live(), 1);

            // Double bind is refused
            assert!(matches!(
                table2.bind_current(),
                Err(UmsError::InvariantViolation)
            ));

            table2.release_current();
            assert_eq!(table2.live(), 0);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_stale_token_rejected() {
        let table = Arc::new(ContextTable::new(4));
        let table2 = Arc::clone(&table);

        let stale = thread::spawn(move || {
            let ctx = table2.bind_current().unwrap();
            table2.release_current();
            ctx
        })
        .join()
        .unwrap();

        assert!(matches!(table.resume(stale), Err(UmsError::Gone)));
        assert!(matches!(
            table.resume(SavedContext::invalid()),
            Err(UmsError::Gone)
        ));
    }

    #[test]
    fn test_slot_recycled_with_new_generation() {
        let table = Arc::new(ContextTable::new(4));

        let first = {
            let table2 = Arc::clone(&table);
            thread::spawn(move || {
                let ctx = table2.bind_current().unwrap();
                table2.release_current();
                ctx
            })
            .join()
            .unwrap()
        };

        let second = {
            let table2 = Arc::clone(&table);
            thread::spawn(move || {
                let ctx = table2.bind_current().unwrap();
                table2.release_current();
                ctx
            })
            .join()
            .unwrap()
        };

        assert_eq!(first.slot(), second.slot());
        assert_ne!(first.generation(), second.generation());
    }

    #[test]
    fn test_suspend_resume_cross_thread() {
        let table = Arc::new(ContextTable::new(4));
        let table2 = Arc::clone(&table);
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let ctx = table2.bind_current().unwrap();
            tx.send(ctx).unwrap();
            table2.suspend().unwrap();
            table2.release_current();
            42u32
        });

        let ctx = rx.recv().unwrap();
        // Resume may land before or after the suspend; both must work
        table.resume(ctx).unwrap();
        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn test_capacity_exhausted() {
        let table = Arc::new(ContextTable::new(1));
        let table2 = Arc::clone(&table);
        let (bound_tx, bound_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let holder = thread::spawn(move || {
            table2.bind_current().unwrap();
            bound_tx.send(()).unwrap();
            done_rx.recv().unwrap();
            table2.release_current();
        });

        bound_rx.recv().unwrap();
        let table3 = Arc::clone(&table);
        let denied = thread::spawn(move || table3.bind_current())
            .join()
            .unwrap();
        assert!(matches!(denied, Err(UmsError::Exhausted)));

        done_tx.send(()).unwrap();
        holder.join().unwrap();
        assert_eq!(table.live(), 0);
    }
}
