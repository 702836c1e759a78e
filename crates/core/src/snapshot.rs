//! Snapshot - the published result of one successful sync cycle.

use serde::{Deserialize, Serialize};

use crate::activity::Activity;
use crate::blocker::{BlockerFinding, Severity};
use crate::error::CycleIssue;
use crate::feature::{Feature, TaskGrouping};
use crate::id::{CycleId, FeatureId, SourceSystem, TaskId};
use crate::task::Task;
use crate::velocity::{Trend, VelocitySample};
use crate::Time;

/// Complete, immutable output of a cycle.
///
/// Readers hold it behind an `Arc`; a new cycle builds a fresh value and
/// replaces the pointer, so a reader never sees a mix of two cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Cycle that produced it (`None` before the first cycle)
    pub cycle_id: Option<CycleId>,

    /// When the cycle finished
    pub completed_at: Option<Time>,

    /// Backends whose data is included
    pub backends: Vec<SourceSystem>,

    /// All normalized tasks, grouped or orphan
    pub tasks: Vec<Task>,

    /// Features with their progress for this cycle
    pub features: Vec<Feature>,

    /// Tasks in no feature
    pub orphan_task_ids: Vec<TaskId>,

    /// Grouping decision per task
    pub groupings: Vec<TaskGrouping>,

    /// Normalized source-control activity
    pub activities: Vec<Activity>,

    /// Blockers, oldest first
    pub blockers: Vec<BlockerFinding>,

    /// Velocity series, oldest bucket first
    pub velocity: Vec<VelocitySample>,

    /// Velocity trend over recent closed buckets
    pub trend: Trend,

    /// Headline numbers
    pub summary: HealthSummary,

    /// Non-fatal problems from this cycle
    pub issues: Vec<CycleIssue>,
}

impl Snapshot {
    /// Snapshot published before any cycle has completed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this is the placeholder published before the first cycle.
    pub fn is_initial(&self) -> bool {
        self.cycle_id.is_none()
    }

    /// Look up a feature.
    pub fn feature(&self, id: &FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| &f.id == id)
    }

    /// Look up a task.
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Velocity samples whose bucket had ended.
    pub fn closed_samples(&self) -> impl Iterator<Item = &VelocitySample> {
        self.velocity.iter().filter(|s| s.closed)
    }
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    /// Pull requests opened and not yet merged or closed
    pub open_prs: usize,

    /// Tasks not done
    pub open_tasks: usize,

    /// Tasks in progress
    pub in_progress_tasks: usize,

    /// Tasks done
    pub done_tasks: usize,

    /// Tasks in no feature
    pub orphan_tasks: usize,

    /// All blocker findings
    pub blockers: usize,

    /// High severity findings
    pub high_severity_blockers: usize,

    /// Medium severity findings
    pub medium_severity_blockers: usize,

    /// Commits in the 7 days before the cycle
    pub commits_last_7d: usize,

    /// Average commits per day over those 7 days
    pub commits_per_day: f64,

    /// Commits observed in total
    pub total_commits: usize,
}

impl HealthSummary {
    /// Count of findings at a severity.
    pub fn blockers_at(&self, severity: Severity) -> usize {
        match severity {
            Severity::High => self.high_severity_blockers,
            Severity::Medium => self.medium_severity_blockers,
        }
    }
}

/// Sync coordinator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No cycle has run yet
    #[default]
    Idle,
    /// Waiting on adapters
    Fetching,
    /// Mapping raw records into the canonical model
    Normalizing,
    /// Detecting blockers and computing metrics
    Analyzing,
    /// Last cycle published a snapshot
    Ready,
    /// Last cycle failed; the previous snapshot is still served
    Error,
}

impl SyncState {
    /// Whether a cycle is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncState::Fetching | SyncState::Normalizing | SyncState::Analyzing)
    }

    /// Whether the machine may move from `self` to `next`.
    pub fn can_transition_to(&self, next: SyncState) -> bool {
        use SyncState::*;

        match (self, next) {
            (_, Error) => true,
            (Idle | Ready | Error, Fetching) => true,
            (Fetching, Normalizing) => true,
            (Normalizing, Analyzing) => true,
            (Analyzing, Ready) => true,
            _ => false,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Fetching => "fetching",
            SyncState::Normalizing => "normalizing",
            SyncState::Analyzing => "analyzing",
            SyncState::Ready => "ready",
            SyncState::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
