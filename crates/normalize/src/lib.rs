//! Normalization (Layer 2)
//!
//! Raw adapter batches into the canonical task pool, activities and
//! feature groupings.

#![warn(missing_docs)]

pub mod timestamp;
pub mod tasks;
pub mod activities;
pub mod identity;

pub use timestamp::parse_timestamp;
pub use tasks::{normalize_project, normalize_tasks, ProjectNormalization, TaskNormalization};
pub use activities::{link_tasks, normalize_activities, ActivityNormalization};
pub use identity::{resolve_features, IdentityResolution};

use std::collections::HashMap;

use roadmap_core::raw::{RawBatch, RawPayload, RawGitHubEvent};
use roadmap_core::{
    Activity, ComputationError, CycleIssue, Feature, StatusMappingTable, Task, TaskGrouping, TaskId,
};
use tracing::debug;

/// Everything normalization produced for one cycle.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Shared task pool across all PM backends
    pub tasks: Vec<Task>,

    /// Features with their member tasks
    pub features: Vec<Feature>,

    /// Tasks in no feature
    pub orphan_task_ids: Vec<TaskId>,

    /// Grouping decision per task
    pub groupings: Vec<TaskGrouping>,

    /// GitHub activities ordered by timestamp
    pub activities: Vec<Activity>,

    /// Excluded records and orphaned tasks
    pub issues: Vec<CycleIssue>,
}

/// Normalize every batch of a cycle.
///
/// PM batches are normalized first so GitHub events can be linked against
/// the complete task pool. Each backend contributes independently; one
/// backend's excluded records never affect another's.
pub fn normalize_batches(
    batches: &[RawBatch],
    table: &StatusMappingTable,
) -> Result<Normalized, ComputationError> {
    let mut out = Normalized::default();
    let mut features: Vec<Feature> = Vec::new();
    let mut cross_references: HashMap<TaskId, String> = HashMap::new();
    let mut events: Vec<&RawGitHubEvent> = Vec::new();
    let mut positions: HashMap<TaskId, usize> = HashMap::new();

    for batch in batches {
        match &batch.payload {
            RawPayload::Project(project) => {
                let normalized = normalize_project(project, batch.backend, table)?;
                features.extend(normalized.features);
                let mut references = normalized.tasks.cross_references;
                // Two sources for the same backend may overlap; the newer record
                // wins along with its own cross-reference.
                for task in normalized.tasks.tasks {
                    let reference = references.remove(&task.id);
                    let slot = match positions.get(&task.id).copied() {
                        Some(pos) if task.last_updated >= out.tasks[pos].last_updated => pos,
                        Some(_) => continue,
                        None => {
                            positions.insert(task.id.clone(), out.tasks.len());
                            out.tasks.push(task.clone());
                            out.tasks.len() - 1
                        }
                    };
                    match reference {
                        Some(reference) => cross_references.insert(task.id.clone(), reference),
                        None => cross_references.remove(&task.id),
                    };
                    out.tasks[slot] = task;
                }
                out.issues.extend(normalized.tasks.errors.into_iter().map(CycleIssue::from));
            }
            RawPayload::Activity(activity) => events.extend(activity.events.iter()),
        }
    }

    let events: Vec<RawGitHubEvent> = events.into_iter().cloned().collect();
    let activity = normalize_activities(&events, &out.tasks)?;
    out.issues.extend(activity.errors.into_iter().map(CycleIssue::from));
    link_tasks(&mut out.tasks, &activity.activities);
    out.activities = activity.activities;

    let identity = resolve_features(features, &out.tasks, &cross_references);
    out.features = identity.features;
    out.orphan_task_ids = identity.orphan_task_ids;
    out.groupings = identity.groupings;
    out.issues.extend(identity.errors.into_iter().map(CycleIssue::from));

    debug!(
        "Normalized {} batches: {} tasks, {} features, {} activities, {} issues",
        batches.len(),
        out.tasks.len(),
        out.features.len(),
        out.activities.len(),
        out.issues.len()
    );
    Ok(out)
}
