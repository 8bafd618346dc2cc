//! # umsched-core
//!
//! Core types for the umsched user-mode scheduling runtime.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! All platform-specific implementations are in `umsched-runtime`.
//!
//! ## Modules
//!
//! - `id` - Identifier types for lists, elements and schedulers
//! - `state` - Completion element lifecycle states
//! - `stats` - Per-element and per-worker bookkeeping
//! - `context` - Saved execution context tokens and the switch trait
//! - `interrupt` - Interrupt flag for blocking reservation waits
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

#![allow(dead_code)]

pub mod context;
pub mod env;
pub mod error;
pub mod id;
pub mod interrupt;
pub mod kprint;
pub mod state;
pub mod stats;

// Re-exports for convenience
pub use context::{ContextSwitch, SavedContext};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};
pub use error::{UmsError, UmsResult};
pub use id::{ElemId, IdGen, ListId, SchedId};
pub use interrupt::InterruptFlag;
pub use state::{AtomicElemState, ElemState};
pub use stats::{ElemStats, ElemStatsSnapshot, WorkerSnapshot, WorkerState, WORKER_STATE_SIZE};

/// Runtime-wide constants
pub mod constants {
    /// Maximum carrier workers (OS threads) per process
    pub const MAX_CPUS: usize = 64;

    /// Default maximum live execution contexts
    pub const DEFAULT_MAX_CONTEXTS: usize = 65536;

    /// No element sentinel value
    pub const ELEM_NONE: u32 = u32::MAX;

    /// Cache line size for alignment
    pub const CACHE_LINE_SIZE: usize = 64;
}
