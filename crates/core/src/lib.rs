//! Roadmap health core data models.
//!
//! This crate defines the canonical domain model every backend is
//! normalized into, the raw adapter records it is normalized from, and the
//! snapshot the sync coordinator publishes.

#![warn(missing_docs)]

// Core identities
mod id;

// Canonical entities
mod task;
mod feature;
mod activity;
mod blocker;
mod velocity;

// Adapter output contract
pub mod raw;

// Engine configuration and results
mod config;
mod error;
mod snapshot;

// Re-exports
pub use id::*;

pub use task::{Task, TaskStatus, TaskLink, LinkKind};
pub use feature::{Feature, GroupingDecision, OrphanReason, TaskGrouping};
pub use activity::{Activity, ActivityKind, pr_subject};
pub use blocker::{BlockerFinding, BlockerRule, Severity};
pub use velocity::{VelocitySample, Bucketing, Coverage, Trend};

pub use config::{
    EngineConfig, StatusMappingTable, Rules, ProgressMethod, VelocityConfig, TrendConfig, SyncConfig,
};
pub use error::{ComputationError, MappingError, AmbiguousIdentityError, CycleIssue};
pub use snapshot::{Snapshot, HealthSummary, SyncState};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
