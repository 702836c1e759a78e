//! Cross-system identity resolution: grouping tasks into features.
//!
//! Every task gets an explicit [`GroupingDecision`]. The key is the record's
//! cross-reference when it has one, otherwise an exact (case-insensitive)
//! match of the task title against feature names. Anything unclear leaves
//! the task orphan instead of guessing.

use std::collections::HashMap;

use roadmap_core::{
    AmbiguousIdentityError, Feature, FeatureId, GroupingDecision, OrphanReason, Task, TaskGrouping,
    TaskId,
};
use tracing::{debug, warn};

/// Result of grouping a task pool into features.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolution {
    /// Features with their member tasks
    pub features: Vec<Feature>,

    /// Tasks in no feature, in pool order
    pub orphan_task_ids: Vec<TaskId>,

    /// Decision per task, in pool order
    pub groupings: Vec<TaskGrouping>,

    /// Orphans caused by a broken reference or an ambiguous title
    pub errors: Vec<AmbiguousIdentityError>,
}

/// Group `tasks` into `features`.
pub fn resolve_features(
    features: Vec<Feature>,
    tasks: &[Task],
    cross_references: &HashMap<TaskId, String>,
) -> IdentityResolution {
    let mut out = IdentityResolution::default();
    let mut by_id: HashMap<FeatureId, usize> = HashMap::new();
    let mut by_name: HashMap<String, Vec<FeatureId>> = HashMap::new();

    for mut feature in features {
        if by_id.contains_key(&feature.id) {
            continue;
        }
        feature.task_ids.clear();
        by_id.insert(feature.id.clone(), out.features.len());
        by_name.entry(name_key(&feature.name)).or_default().push(feature.id.clone());
        out.features.push(feature);
    }

    for task in tasks {
        let decision = decide(task, cross_references.get(&task.id), &by_id, &by_name);

        match &decision {
            GroupingDecision::ByReference { feature_id } | GroupingDecision::ByTitle { feature_id } => {
                if let Some(&pos) = by_id.get(feature_id) {
                    out.features[pos].add_task(task.id.clone());
                }
            }
            GroupingDecision::Orphan { reason } => {
                out.orphan_task_ids.push(task.id.clone());
                if let Some(message) = orphan_error(reason) {
                    warn!("Task {} left orphan: {}", task.id, message);
                    out.errors.push(AmbiguousIdentityError { task_id: task.id.clone(), reason: message });
                }
            }
        }

        out.groupings.push(TaskGrouping { task_id: task.id.clone(), decision });
    }

    debug!(
        "Grouped {} tasks into {} features ({} orphan)",
        tasks.len(),
        out.features.len(),
        out.orphan_task_ids.len()
    );
    out
}

fn decide(
    task: &Task,
    reference: Option<&String>,
    by_id: &HashMap<FeatureId, usize>,
    by_name: &HashMap<String, Vec<FeatureId>>,
) -> GroupingDecision {
    if let Some(reference) = reference {
        let feature_id = FeatureId::from_reference(task.source_system, reference);
        return if by_id.contains_key(&feature_id) {
            GroupingDecision::ByReference { feature_id }
        } else {
            GroupingDecision::Orphan {
                reason: OrphanReason::UnresolvedReference { reference: reference.clone() },
            }
        };
    }

    match by_name.get(&name_key(&task.title)).map(Vec::as_slice) {
        Some([feature_id]) => GroupingDecision::ByTitle { feature_id: feature_id.clone() },
        Some(candidates) if candidates.len() > 1 => GroupingDecision::Orphan {
            reason: OrphanReason::AmbiguousTitle { candidates: candidates.to_vec() },
        },
        _ => GroupingDecision::Orphan { reason: OrphanReason::NoReferenceOrTitleMatch },
    }
}

fn orphan_error(reason: &OrphanReason) -> Option<String> {
    match reason {
        OrphanReason::NoReferenceOrTitleMatch => None,
        OrphanReason::UnresolvedReference { reference } => {
            Some(format!("reference {:?} names no known feature", reference))
        }
        OrphanReason::AmbiguousTitle { candidates } => Some(format!(
            "title matches {} features ({})",
            candidates.len(),
            candidates.iter().map(FeatureId::as_str).collect::<Vec<_>>().join(", ")
        )),
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use roadmap_core::{SourceSystem, TaskStatus};

    fn task(system: SourceSystem, id: &str, title: &str) -> Task {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Task::new(system, id, title, TaskStatus::Todo, now)
    }

    fn feature(system: SourceSystem, id: &str, name: &str) -> Feature {
        Feature::new(FeatureId::new(system, id), name)
    }

    #[test]
    fn test_reference_takes_precedence_over_title() {
        let features = vec![
            feature(SourceSystem::Jira, "E-1", "Checkout"),
            feature(SourceSystem::Jira, "E-2", "Search"),
        ];
        let tasks = vec![task(SourceSystem::Jira, "PAY-1", "Search")];
        let refs = HashMap::from([(tasks[0].id.clone(), "E-1".to_string())]);

        let out = resolve_features(features, &tasks, &refs);

        assert_eq!(
            out.groupings[0].decision,
            GroupingDecision::ByReference { feature_id: FeatureId::new(SourceSystem::Jira, "E-1") }
        );
        assert_eq!(out.features[0].task_ids, vec![tasks[0].id.clone()]);
        assert!(out.features[1].task_ids.is_empty());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_qualified_reference_crosses_backends() {
        let features = vec![feature(SourceSystem::Jira, "E-1", "Checkout")];
        let tasks = vec![task(SourceSystem::Linear, "ENG-1", "Wire payment form")];
        let refs = HashMap::from([(tasks[0].id.clone(), "jira:E-1".to_string())]);

        let out = resolve_features(features, &tasks, &refs);
        assert_eq!(out.groupings[0].decision.feature_id(), Some(&FeatureId::new(SourceSystem::Jira, "E-1")));
    }

    #[test]
    fn test_unresolved_reference_is_orphan_with_error() {
        let features = vec![feature(SourceSystem::Jira, "E-1", "Checkout")];
        let tasks = vec![task(SourceSystem::Jira, "PAY-1", "Checkout")];
        let refs = HashMap::from([(tasks[0].id.clone(), "E-404".to_string())]);

        let out = resolve_features(features, &tasks, &refs);

        assert_eq!(out.orphan_task_ids, vec![tasks[0].id.clone()]);
        assert!(matches!(
            out.groupings[0].decision,
            GroupingDecision::Orphan { reason: OrphanReason::UnresolvedReference { .. } }
        ));
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn test_title_fallback_case_insensitive() {
        let features = vec![feature(SourceSystem::Asana, "123", "Mobile Onboarding")];
        let tasks = vec![task(SourceSystem::Asana, "456", "  mobile onboarding ")];

        let out = resolve_features(features, &tasks, &HashMap::new());
        assert_eq!(
            out.groupings[0].decision,
            GroupingDecision::ByTitle { feature_id: FeatureId::new(SourceSystem::Asana, "123") }
        );
    }

    #[test]
    fn test_ambiguous_title_is_orphan_not_a_guess() {
        let features = vec![
            feature(SourceSystem::Jira, "E-1", "Checkout"),
            feature(SourceSystem::Linear, "P-1", "checkout"),
        ];
        let tasks = vec![task(SourceSystem::Asana, "9", "Checkout")];

        let out = resolve_features(features, &tasks, &HashMap::new());

        assert!(out.features.iter().all(|f| f.task_ids.is_empty()));
        match &out.groupings[0].decision {
            GroupingDecision::Orphan { reason: OrphanReason::AmbiguousTitle { candidates } } => {
                assert_eq!(candidates.len(), 2)
            }
            other => panic!("unexpected decision {:?}", other),
        }
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn test_no_match_is_silent_orphan() {
        let tasks = vec![task(SourceSystem::Jira, "PAY-1", "Tidy logs")];
        let out = resolve_features(Vec::new(), &tasks, &HashMap::new());
        assert_eq!(out.orphan_task_ids.len(), 1);
        assert!(out.errors.is_empty());
        assert_eq!(
            out.groupings[0].decision,
            GroupingDecision::Orphan { reason: OrphanReason::NoReferenceOrTitleMatch }
        );
    }

    #[test]
    fn test_every_task_in_at_most_one_feature() {
        let features = vec![
            feature(SourceSystem::Jira, "E-1", "Checkout"),
            feature(SourceSystem::Jira, "E-1", "Checkout duplicate"),
        ];
        let tasks = vec![
            task(SourceSystem::Jira, "PAY-1", "a"),
            task(SourceSystem::Jira, "PAY-2", "Checkout"),
        ];
        let refs = HashMap::from([(tasks[0].id.clone(), "E-1".to_string())]);

        let out = resolve_features(features, &tasks, &refs);

        assert_eq!(out.features.len(), 1);
        for t in &tasks {
            let memberships = out.features.iter().filter(|f| f.contains(&t.id)).count()
                + out.orphan_task_ids.iter().filter(|id| *id == &t.id).count();
            assert_eq!(memberships, 1);
        }
    }
}
