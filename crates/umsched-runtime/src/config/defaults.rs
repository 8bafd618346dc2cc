//! Compile-time configuration defaults
//!
//! Environment variables override these at startup via `UmsConfig::from_env`.
//! The carrier count has no const default; it falls back to the machine
//! CPU count at construction time.

use umsched_core::constants::DEFAULT_MAX_CONTEXTS;

/// Maximum live execution contexts (carriers plus element threads)
pub const MAX_CONTEXTS: usize = DEFAULT_MAX_CONTEXTS;

/// Reservation batch size used by the convenience dispatch helpers
pub const RESERVE_BATCH: u32 = 1;

/// Pin carrier threads to their CPU
pub const PIN_CARRIERS: bool = true;

/// Debug logging
pub const DEBUG_LOGGING: bool = false;

/// Stack size per completion element thread
pub const STACK_SIZE: usize = 512 * 1024;
