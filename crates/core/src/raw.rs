//! Raw records as produced by source adapters, in each backend's native vocabulary.
//!
//! These mirror the adapter output contract. Timestamps stay strings here;
//! parsing them is part of normalization.

use serde::{Deserialize, Serialize};
use crate::id::SourceSystem;

/// An epic or project reported by a PM backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFeatureRecord {
    /// Backend-native id
    pub native_id: String,

    /// Epic or project name
    pub name: String,
}

/// An issue or task reported by a PM backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTaskRecord {
    /// Backend-native id (`PAY-12`, a Linear identifier, an Asana gid)
    pub native_id: String,

    /// Status in the backend's own vocabulary
    pub native_status: String,

    /// Title or summary
    pub title: String,

    /// Assignee display name
    #[serde(default)]
    pub assignee: Option<String>,

    /// Story point estimate
    #[serde(default)]
    pub story_points: Option<f64>,

    /// RFC 3339 last-update timestamp
    pub last_updated: String,

    /// Explicit epic/project reference, bare or `system:id`
    #[serde(default)]
    pub cross_reference: Option<String>,

    /// Native ids of tasks this one depends on, bare or `system:id`
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A source-control event reported by the GitHub backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGitHubEvent {
    /// `commit`, `pr_opened`, `pr_merged`, `pr_closed`
    pub event_kind: String,

    /// Repository (`owner/name`)
    pub repo: String,

    /// RFC 3339 event timestamp
    pub timestamp: String,

    /// Pull request number for PR events
    #[serde(default)]
    pub pr_number: Option<u64>,

    /// PR title or commit headline
    #[serde(default)]
    pub title: String,

    /// Head branch of the PR or the pushed branch
    #[serde(default)]
    pub branch_ref: Option<String>,

    /// Commit SHA for commit events
    #[serde(default)]
    pub sha: Option<String>,
}

/// Everything a PM backend returned in one fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectBatch {
    /// Epics or projects
    #[serde(default)]
    pub features: Vec<RawFeatureRecord>,

    /// Issues or tasks
    #[serde(default)]
    pub tasks: Vec<RawTaskRecord>,
}

/// Everything the GitHub backend returned in one fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityBatch {
    /// Events in any order
    #[serde(default)]
    pub events: Vec<RawGitHubEvent>,
}

/// Payload of one adapter fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// Jira, Linear, or Asana data
    Project(ProjectBatch),
    /// GitHub data
    Activity(ActivityBatch),
}

/// One backend's complete output for a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    /// Backend that produced it
    pub backend: SourceSystem,

    /// The records
    pub payload: RawPayload,
}

impl RawBatch {
    /// Batch from a PM backend.
    pub fn project(backend: SourceSystem, batch: ProjectBatch) -> Self {
        Self { backend, payload: RawPayload::Project(batch) }
    }

    /// Batch from GitHub.
    pub fn activity(batch: ActivityBatch) -> Self {
        Self { backend: SourceSystem::GitHub, payload: RawPayload::Activity(batch) }
    }

    /// Number of raw records carried.
    pub fn len(&self) -> usize {
        match &self.payload {
            RawPayload::Project(b) => b.features.len() + b.tasks.len(),
            RawPayload::Activity(b) => b.events.len(),
        }
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
