//! Error taxonomy shared across the engine.
//!
//! `ComputationError` is fatal to the cycle that raised it. The other kinds
//! are collected as [`CycleIssue`]s and published with the snapshot.

use serde::{Deserialize, Serialize};

use crate::id::{SourceSystem, TaskId};

/// Unexpected invariant violation inside a stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputationError {
    /// A timestamp could not be parsed
    #[error("malformed timestamp {value:?} on {subject}")]
    MalformedTimestamp {
        /// Record the timestamp belongs to
        subject: String,
        /// The offending value
        value: String,
    },

    /// Configuration is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stage produced an inconsistent result
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// A single record whose native status has no canonical mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{backend} record {subject_id} has unmapped status {native_status:?}")]
pub struct MappingError {
    /// Record id (`system:native_id`)
    pub subject_id: String,

    /// The unmapped value
    pub native_status: String,

    /// Backend that produced it
    pub backend: SourceSystem,
}

/// Identity resolution could not place a task into a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("task {task_id} left orphan: {reason}")]
pub struct AmbiguousIdentityError {
    /// The orphaned task
    pub task_id: TaskId,

    /// What went wrong
    pub reason: String,
}

/// A non-fatal problem recorded during one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleIssue {
    /// A whole backend's data is missing from the cycle
    AdapterFailure {
        /// The backend
        backend: SourceSystem,
        /// Why it failed
        reason: String,
    },
    /// A record was excluded
    Mapping(MappingError),
    /// A task became an orphan
    AmbiguousIdentity(AmbiguousIdentityError),
}

impl CycleIssue {
    /// Whether this issue is an adapter failure.
    pub fn is_adapter_failure(&self) -> bool {
        matches!(self, CycleIssue::AdapterFailure { .. })
    }
}

impl std::fmt::Display for CycleIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleIssue::AdapterFailure { backend, reason } => {
                write!(f, "{} adapter failed: {}", backend, reason)
            }
            CycleIssue::Mapping(e) => e.fmt(f),
            CycleIssue::AmbiguousIdentity(e) => e.fmt(f),
        }
    }
}

impl From<MappingError> for CycleIssue {
    fn from(e: MappingError) -> Self {
        CycleIssue::Mapping(e)
    }
}

impl From<AmbiguousIdentityError> for CycleIssue {
    fn from(e: AmbiguousIdentityError) -> Self {
        CycleIssue::AmbiguousIdentity(e)
    }
}
