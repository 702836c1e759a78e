//! PM backend records into canonical tasks and features.

use std::collections::HashMap;

use roadmap_core::raw::{ProjectBatch, RawTaskRecord};
use roadmap_core::{
    ComputationError, Feature, FeatureId, MappingError, SourceSystem, StatusMappingTable, Task,
    TaskId, TaskLink,
};
use tracing::{debug, warn};

use crate::timestamp::parse_timestamp;

/// Output of normalizing one backend's task records.
#[derive(Debug, Clone, Default)]
pub struct TaskNormalization {
    /// Tasks whose status mapped, in input order
    pub tasks: Vec<Task>,

    /// Records excluded because their status is unmapped
    pub errors: Vec<MappingError>,

    /// Explicit feature reference per task, where the record carried one
    pub cross_references: HashMap<TaskId, String>,
}

/// Output of normalizing one PM backend's full batch.
#[derive(Debug, Clone, Default)]
pub struct ProjectNormalization {
    /// Features declared by the backend
    pub features: Vec<Feature>,

    /// Tasks, errors and references
    pub tasks: TaskNormalization,
}

/// Map raw task records into canonical tasks.
///
/// A record whose native status is missing from `table` for `backend` is
/// excluded and reported; the rest of the batch still normalizes. A
/// malformed timestamp fails the whole call. When a native id repeats, the
/// most recently updated record wins.
pub fn normalize_tasks(
    records: &[RawTaskRecord],
    backend: SourceSystem,
    table: &StatusMappingTable,
) -> Result<TaskNormalization, ComputationError> {
    let mut out = TaskNormalization::default();
    let mut index: HashMap<TaskId, usize> = HashMap::new();

    for record in records {
        let id = TaskId::new(backend, &record.native_id);

        let Some(status) = table.lookup(backend, &record.native_status) else {
            warn!(
                "Excluding {}: unmapped {} status {:?}",
                id, backend, record.native_status
            );
            out.errors.push(MappingError {
                subject_id: id.to_string(),
                native_status: record.native_status.clone(),
                backend,
            });
            continue;
        };

        let task = build_task(record, id.clone(), status, backend)?;

        if let Some(pos) = index.get(&id).copied() {
            if task.last_updated >= out.tasks[pos].last_updated {
                debug!("Duplicate record {}, keeping the newer one", id);
                out.tasks[pos] = task;
                set_reference(&mut out.cross_references, &id, record);
            }
        } else {
            index.insert(id.clone(), out.tasks.len());
            out.tasks.push(task);
            set_reference(&mut out.cross_references, &id, record);
        }
    }

    debug!(
        "Normalized {} {} tasks ({} excluded)",
        out.tasks.len(),
        backend,
        out.errors.len()
    );
    Ok(out)
}

/// Normalize a PM backend's features and tasks.
pub fn normalize_project(
    batch: &ProjectBatch,
    backend: SourceSystem,
    table: &StatusMappingTable,
) -> Result<ProjectNormalization, ComputationError> {
    let mut features: Vec<Feature> = Vec::with_capacity(batch.features.len());
    for record in &batch.features {
        let id = FeatureId::new(backend, &record.native_id);
        if features.iter().any(|f| f.id == id) {
            debug!("Duplicate feature {}, keeping the first", id);
            continue;
        }
        features.push(Feature::new(id, record.name.trim()));
    }

    Ok(ProjectNormalization {
        features,
        tasks: normalize_tasks(&batch.tasks, backend, table)?,
    })
}

fn build_task(
    record: &RawTaskRecord,
    id: TaskId,
    status: roadmap_core::TaskStatus,
    backend: SourceSystem,
) -> Result<Task, ComputationError> {
    let last_updated = parse_timestamp(id.as_str(), &record.last_updated)?;

    let story_points = match record.story_points {
        Some(points) if points.is_finite() && points >= 0.0 => Some(points),
        Some(points) => {
            warn!("Ignoring invalid story points {} on {}", points, id);
            None
        }
        None => None,
    };

    let assignee = record
        .assignee
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    let mut task = Task {
        id,
        title: record.title.trim().to_string(),
        status,
        assignee,
        story_points,
        source_system: backend,
        last_updated,
        links: Vec::new(),
    };
    for dep in record.depends_on.iter().filter(|d| !d.trim().is_empty()) {
        let dep_id = TaskId::from_reference(backend, dep);
        if dep_id != task.id {
            task.add_link(TaskLink::depends_on(&dep_id));
        }
    }
    Ok(task)
}

fn set_reference(refs: &mut HashMap<TaskId, String>, id: &TaskId, record: &RawTaskRecord) {
    match record.cross_reference.as_deref().map(str::trim) {
        Some(reference) if !reference.is_empty() => {
            refs.insert(id.clone(), reference.to_string());
        }
        _ => {
            refs.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadmap_core::raw::RawFeatureRecord;
    use roadmap_core::{LinkKind, TaskStatus};

    fn record(id: &str, status: &str, updated: &str) -> RawTaskRecord {
        RawTaskRecord {
            native_id: id.to_string(),
            native_status: status.to_string(),
            title: format!("Task {}", id),
            assignee: None,
            story_points: None,
            last_updated: updated.to_string(),
            cross_reference: None,
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn test_unmapped_status_is_excluded_and_reported() {
        let table = StatusMappingTable::standard();
        let records = vec![
            record("PAY-1", "Done", "2024-05-01T10:00:00Z"),
            record("PAY-2", "Parked", "2024-05-01T10:00:00Z"),
            record("PAY-3", "in progress", "2024-05-01T10:00:00Z"),
        ];

        let out = normalize_tasks(&records, SourceSystem::Jira, &table).unwrap();

        assert_eq!(out.tasks.len(), 2);
        assert!(out.tasks.iter().all(|t| TaskStatus::ALL.contains(&t.status)));
        assert!(out.tasks.iter().all(|t| t.id.as_str() != "jira:PAY-2"));
        assert_eq!(
            out.errors,
            vec![MappingError {
                subject_id: "jira:PAY-2".into(),
                native_status: "Parked".into(),
                backend: SourceSystem::Jira,
            }]
        );
    }

    #[test]
    fn test_empty_table_excludes_everything() {
        let records = vec![record("L-1", "Todo", "2024-05-01T10:00:00Z")];
        let out = normalize_tasks(&records, SourceSystem::Linear, &StatusMappingTable::new()).unwrap();
        assert!(out.tasks.is_empty());
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn test_malformed_timestamp_fails_the_batch() {
        let table = StatusMappingTable::standard();
        let records = vec![
            record("PAY-1", "Done", "2024-05-01T10:00:00Z"),
            record("PAY-2", "Done", "last tuesday"),
        ];
        let err = normalize_tasks(&records, SourceSystem::Jira, &table).unwrap_err();
        assert!(matches!(err, ComputationError::MalformedTimestamp { .. }));
    }

    #[test]
    fn test_duplicate_keeps_newest_record() {
        let table = StatusMappingTable::standard();
        let records = vec![
            record("PAY-1", "In Progress", "2024-05-02T10:00:00Z"),
            record("PAY-1", "To Do", "2024-05-01T10:00:00Z"),
            record("PAY-1", "Done", "2024-05-03T10:00:00Z"),
        ];
        let out = normalize_tasks(&records, SourceSystem::Jira, &table).unwrap();
        assert_eq!(out.tasks.len(), 1);
        assert_eq!(out.tasks[0].status, TaskStatus::Done);
    }

    #[test]
    fn test_fields_are_cleaned() {
        let table = StatusMappingTable::standard();
        let mut raw = record("PAY-1", "Done", "2024-05-01T10:00:00Z");
        raw.assignee = Some("  ".into());
        raw.story_points = Some(-2.0);
        raw.cross_reference = Some(" PAY-100 ".into());
        raw.depends_on = vec!["PAY-9".into(), "linear:ENG-4".into(), "PAY-1".into()];

        let out = normalize_tasks(&[raw], SourceSystem::Jira, &table).unwrap();
        let task = &out.tasks[0];

        assert!(task.assignee.is_none());
        assert!(task.story_points.is_none());
        assert_eq!(out.cross_references.get(&task.id).map(String::as_str), Some("PAY-100"));
        assert_eq!(task.dependencies().collect::<Vec<_>>(), vec!["jira:PAY-9", "linear:ENG-4"]);
        assert!(task.links.iter().all(|l| l.kind == LinkKind::DependsOn));
    }

    #[test]
    fn test_normalize_project_dedupes_features() {
        let batch = ProjectBatch {
            features: vec![
                RawFeatureRecord { native_id: "E-1".into(), name: " Checkout ".into() },
                RawFeatureRecord { native_id: "E-1".into(), name: "Other".into() },
            ],
            tasks: vec![record("PAY-1", "Done", "2024-05-01T10:00:00Z")],
        };
        let out = normalize_project(&batch, SourceSystem::Jira, &StatusMappingTable::standard()).unwrap();
        assert_eq!(out.features.len(), 1);
        assert_eq!(out.features[0].name, "Checkout");
        assert_eq!(out.features[0].id.as_str(), "jira:E-1");
        assert_eq!(out.tasks.tasks.len(), 1);
    }
}
