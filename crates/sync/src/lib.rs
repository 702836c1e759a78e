//! Sync (Layer 4)
//!
//! Source adapters, the sync coordinator state machine, and the periodic
//! scheduler that drives it.

#![warn(missing_docs)]

pub mod adapter;
pub mod coordinator;
pub mod scheduler;

pub use adapter::{AdapterError, SourceAdapter};
pub use coordinator::{SyncCoordinator, SyncStatus, SyncView, TriggerOutcome};
pub use scheduler::{SchedulerHandle, SyncScheduler};
