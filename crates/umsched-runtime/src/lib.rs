//! # umsched-runtime
//!
//! Runtime half of the user-mode scheduling stack.
//!
//! This crate provides:
//! - Context parking (futex on Linux, condvar elsewhere)
//! - The context table mapping opaque tokens to parked threads
//! - Delete-safe id registries for lists, elements and schedulers
//! - Completion lists with blocking reservation
//! - Scheduler and worker bookkeeping
//! - The `Runtime` object carrying all scheduling operations

#![allow(dead_code)]

pub mod complist;
pub mod config;
pub mod context_table;
pub mod parking;
pub mod platform;
pub mod registry;
pub mod runtime;
pub mod sched;
pub mod sync;
pub mod tls;

// Re-exports
pub use complist::{CompletionElement, CompletionList, ElemInfo, ListInfo, WorkerRef};
pub use config::{ConfigError, UmsConfig};
pub use context_table::ContextTable;
pub use parking::{ContextParking, PlatformWaitPoint};
pub use registry::{EntryGuard, IdRegistry};
pub use runtime::Runtime;
pub use sched::{SchedInfo, Scheduler, Worker, WorkerInfo};
pub use sync::Semaphore;
