//! Saved execution context tokens
//!
//! A `SavedContext` is an opaque handle to a suspended thread of
//! execution. The runtime mints one when a thread enters the scheduling
//! world and revalidates it on every resume; a stale token (its slot was
//! recycled) is rejected rather than resuming the wrong thread.

use crate::error::UmsResult;
use crate::interrupt::InterruptFlag;

/// Slot value meaning "no context"
const SLOT_NONE: u32 = u32::MAX;

/// Opaque handle to a suspended execution context
///
/// Copyable and cheap to pass around. The pair (slot, generation) is only
/// meaningful to the runtime that issued it; the generation detects slot
/// reuse after the original thread released it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SavedContext {
    slot: u32,
    generation: u32,
}

impl SavedContext {
    /// Construct a token for a slot at a given generation
    #[inline]
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Token that refers to no context
    #[inline]
    pub const fn invalid() -> Self {
        Self {
            slot: SLOT_NONE,
            generation: 0,
        }
    }

    #[inline]
    pub const fn slot(&self) -> u32 {
        self.slot
    }

    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.slot != SLOT_NONE
    }

    /// Pack into a u64 for storage in an atomic
    #[inline]
    pub const fn to_bits(&self) -> u64 {
        ((self.slot as u64) << 32) | (self.generation as u64)
    }

    /// Unpack from a u64 produced by `to_bits`
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            slot: (bits >> 32) as u32,
            generation: bits as u32,
        }
    }
}

impl Default for SavedContext {
    fn default() -> Self {
        Self::invalid()
    }
}

impl core::fmt::Debug for SavedContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_valid() {
            write!(f, "SavedContext(slot={}, gen={})", self.slot, self.generation)
        } else {
            write!(f, "SavedContext(invalid)")
        }
    }
}

/// Context save/restore operations
///
/// Implemented by the runtime's context table. Capture and suspend act on
/// the calling thread; resume acts on whichever thread the token names.
pub trait ContextSwitch: Send + Sync {
    /// Snapshot the calling thread's context as a resumable token
    ///
    /// The thread must already be bound to a context slot.
    fn capture(&self) -> UmsResult<SavedContext>;

    /// Allow the thread named by `ctx` to run again
    ///
    /// Does not block. Returns `Err(UmsError::Gone)` if the token is stale.
    fn resume(&self, ctx: SavedContext) -> UmsResult<()>;

    /// Block the calling thread until some other thread resumes it
    ///
    /// A resume issued before the suspend is not lost; the suspend
    /// consumes it and returns immediately.
    fn suspend(&self) -> UmsResult<()>;

    /// Like `suspend`, but wakes with `Err(UmsError::Interrupted)` when
    /// the flag is set
    fn suspend_interruptible(&self, flag: &InterruptFlag) -> UmsResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_round_trip() {
        let ctx = SavedContext::new(17, 0xdead_beef);
        let bits = ctx.to_bits();
        assert_eq!(SavedContext::from_bits(bits), ctx);
    }

    #[test]
    fn test_invalid_default() {
        let ctx = SavedContext::default();
        assert!(!ctx.is_valid());
        assert_eq!(ctx, SavedContext::invalid());
    }

    #[test]
    fn test_invalid_survives_bits() {
        let bits = SavedContext::invalid().to_bits();
        assert!(!SavedContext::from_bits(bits).is_valid());
    }

    #[test]
    fn test_generation_distinguishes_tokens() {
        let a = SavedContext::new(5, 1);
        let b = SavedContext::new(5, 2);
        assert_ne!(a, b);
        assert_eq!(a.slot(), b.slot());
    }
}
