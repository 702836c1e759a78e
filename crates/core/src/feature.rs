//! Feature model - a shippable grouping of tasks.

use serde::{Deserialize, Serialize};
use crate::id::{FeatureId, TaskId};

/// A feature maps to an epic or project in a PM tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Unique identifier
    pub id: FeatureId,

    /// Display name
    pub name: String,

    /// Member tasks in grouping order, each at most once
    pub task_ids: Vec<TaskId>,

    /// Completion percentage for the cycle that produced this value
    pub progress_percent: f64,
}

impl Feature {
    /// Create an empty feature.
    pub fn new(id: FeatureId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            task_ids: Vec::new(),
            progress_percent: 0.0,
        }
    }

    /// Add a member task. Returns false if it was already a member.
    pub fn add_task(&mut self, task_id: TaskId) -> bool {
        if self.task_ids.contains(&task_id) {
            return false;
        }
        self.task_ids.push(task_id);
        true
    }

    /// Whether the task is a member.
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.task_ids.contains(task_id)
    }
}

/// How a task was (or was not) placed into a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum GroupingDecision {
    /// The record's explicit cross-reference named the feature
    ByReference { feature_id: FeatureId },
    /// The task title equals the feature name (case-insensitive)
    ByTitle { feature_id: FeatureId },
    /// Not grouped
    Orphan { reason: OrphanReason },
}

impl GroupingDecision {
    /// Feature the task was grouped into, if any.
    pub fn feature_id(&self) -> Option<&FeatureId> {
        match self {
            GroupingDecision::ByReference { feature_id } | GroupingDecision::ByTitle { feature_id } => {
                Some(feature_id)
            }
            GroupingDecision::Orphan { .. } => None,
        }
    }
}

/// Why a task ended up without a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    /// No cross-reference and no feature with a matching name
    #[serde(alias = "no_match")]
    NoReferenceOrTitleMatch,
    /// The cross-reference names a feature no backend reported
    UnresolvedReference { reference: String },
    /// Several features share the task's title
    AmbiguousTitle { candidates: Vec<FeatureId> },
}

/// Grouping decision recorded for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGrouping {
    /// The task
    pub task_id: TaskId,

    /// The decision and its basis
    pub decision: GroupingDecision,
}
