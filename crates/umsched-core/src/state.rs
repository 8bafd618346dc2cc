//! Completion element lifecycle states

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

/// State of a completion element
///
/// Lifecycle: `Ready` (in its list's ready queue) -> `Reserved` (popped
/// into a reservation batch, not yet running) -> `Running` (hosted by a
/// worker) -> back to `Ready` on yield, until `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElemState {
    /// In the owning list's ready queue, waiting to be reserved
    Ready = 0,

    /// Held in a reservation batch, chosen or sibling
    Reserved = 1,

    /// Hosted by a worker, its logical thread is executing
    Running = 2,

    /// Removed; the backing thread is unwinding
    Destroyed = 3,
}

impl ElemState {
    /// Check whether a dispatcher may exec this element
    #[inline]
    pub const fn is_executable(&self) -> bool {
        matches!(self, ElemState::Reserved)
    }

    /// Check whether this element has been removed
    #[inline]
    pub const fn is_destroyed(&self) -> bool {
        matches!(self, ElemState::Destroyed)
    }
}

impl From<u8> for ElemState {
    fn from(v: u8) -> Self {
        match v {
            0 => ElemState::Ready,
            1 => ElemState::Reserved,
            2 => ElemState::Running,
            _ => ElemState::Destroyed,
        }
    }
}

impl From<ElemState> for u8 {
    fn from(s: ElemState) -> u8 {
        s as u8
    }
}

impl fmt::Display for ElemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElemState::Ready => write!(f, "ready"),
            ElemState::Reserved => write!(f, "reserved"),
            ElemState::Running => write!(f, "running"),
            ElemState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Atomic cell holding an `ElemState`
///
/// Used by introspection paths that read element state without taking the
/// registry entry lock.
pub struct AtomicElemState(AtomicU8);

impl AtomicElemState {
    pub const fn new(s: ElemState) -> Self {
        Self(AtomicU8::new(s as u8))
    }

    #[inline]
    pub fn get(&self) -> ElemState {
        ElemState::from(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, s: ElemState) {
        self.0.store(s as u8, Ordering::Release);
    }
}

impl fmt::Debug for AtomicElemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtomicElemState({:?})", self.get())
    }
}
