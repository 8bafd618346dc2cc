//! Error types for the scheduling runtime

use core::fmt;

/// Result type for runtime operations
pub type UmsResult<T> = Result<T, UmsError>;

/// Errors that can occur in runtime operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UmsError {
    /// Id never existed or was already reclaimed
    NotFound,

    /// Id existed but its owner was concurrently torn down
    ///
    /// Distinct from `NotFound` so callers can tell "never was" from
    /// "raced with deletion".
    Gone,

    /// A per-CPU worker slot is already bound
    AlreadyRegistered,

    /// Blocking wait woken by an interrupt, not by the wait condition
    Interrupted,

    /// Resource allocation failed (context table full)
    Exhausted,

    /// Operation violates a runtime invariant (programmer error)
    InvariantViolation,

    /// Operation invoked by a thread that does not own the entity
    Unauthorized,

    /// Platform-specific error (errno)
    PlatformError(i32),
}

impl fmt::Display for UmsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UmsError::NotFound => write!(f, "entity not found"),
            UmsError::Gone => write!(f, "entity concurrently removed"),
            UmsError::AlreadyRegistered => write!(f, "worker slot already registered"),
            UmsError::Interrupted => write!(f, "blocking wait interrupted"),
            UmsError::Exhausted => write!(f, "resource exhausted"),
            UmsError::InvariantViolation => write!(f, "runtime invariant violated"),
            UmsError::Unauthorized => write!(f, "caller does not own the entity"),
            UmsError::PlatformError(code) => write!(f, "platform error: {}", code),
        }
    }
}

impl std::error::Error for UmsError {}

impl From<std::io::Error> for UmsError {
    fn from(e: std::io::Error) -> Self {
        UmsError::PlatformError(e.raw_os_error().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = UmsError::Interrupted;
        assert_eq!(format!("{}", e), "blocking wait interrupted");

        let e = UmsError::PlatformError(11);
        assert_eq!(format!("{}", e), "platform error: 11");
    }

    #[test]
    fn test_gone_differs_from_not_found() {
        assert_ne!(UmsError::Gone, UmsError::NotFound);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::from_raw_os_error(22);
        let e: UmsError = io.into();
        assert_eq!(e, UmsError::PlatformError(22));
    }
}
