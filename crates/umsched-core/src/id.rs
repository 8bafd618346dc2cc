//! Identifier types for runtime entities
//!
//! Completion lists, completion elements and schedulers each get their own
//! 32-bit id newtype so they cannot be mixed up at call sites. Ids are
//! allocated monotonically by `IdGen` and never reused; the maximum value
//! (u32::MAX) is reserved as a sentinel for "no id".

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $display:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel value indicating no entity
            pub const NONE: $name = $name(u32::MAX);

            /// Create from a raw value
            #[inline]
            pub const fn new(id: u32) -> Self {
                $name(id)
            }

            /// Get the raw u32 value
            #[inline]
            pub const fn as_u32(self) -> u32 {
                self.0
            }

            /// Get as usize for indexing
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }

            /// Check if this is the NONE sentinel
            #[inline]
            pub const fn is_none(self) -> bool {
                self.0 == u32::MAX
            }

            /// Check if this is a valid id
            #[inline]
            pub const fn is_some(self) -> bool {
                self.0 != u32::MAX
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(id: u32) -> Self {
                $name(id)
            }
        }

        impl From<$name> for u32 {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_none() {
                    write!(f, concat!(stringify!($name), "(NONE)"))
                } else {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_none() {
                    write!(f, "none")
                } else {
                    write!(f, concat!($display, "{}"), self.0)
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::NONE
            }
        }
    };
}

define_id! {
    /// Unique identifier for a completion list
    ListId, "L"
}

define_id! {
    /// Unique identifier for a completion element
    ElemId, "E"
}

define_id! {
    /// Unique identifier for a scheduler
    SchedId, "S"
}

/// Monotonic id allocator
///
/// Hands out ids starting at 1; id 0 is never issued so it can be spotted
/// in logs as "uninitialized". Ids are never recycled, which is what makes
/// a stale handle detectable as `NotFound` instead of silently aliasing a
/// newer entity.
pub struct IdGen {
    next: AtomicU32,
}

impl IdGen {
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Allocate the next id
    #[inline]
    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_basics() {
        let id = ElemId::new(42);
        assert_eq!(id.as_u32(), 42);
        assert_eq!(id.as_usize(), 42);
        assert!(!id.is_none());
        assert!(id.is_some());
    }

    #[test]
    fn test_id_none() {
        let none = ListId::NONE;
        assert!(none.is_none());
        assert!(!none.is_some());
        assert_eq!(format!("{}", none), "none");
    }

    #[test]
    fn test_id_conversions() {
        let id: SchedId = 100u32.into();
        let raw: u32 = id.into();
        assert_eq!(raw, 100);
    }

    #[test]
    fn test_display_prefix() {
        assert_eq!(format!("{}", ListId::new(3)), "L3");
        assert_eq!(format!("{}", ElemId::new(7)), "E7");
        assert_eq!(format!("{}", SchedId::new(1)), "S1");
    }

    #[test]
    fn test_idgen_monotonic() {
        let gen = IdGen::new();
        let a = gen.next();
        let b = gen.next();
        let c = gen.next();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(c, 3);
    }
}
