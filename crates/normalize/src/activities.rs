//! GitHub events into canonical activities, linked to tasks by issue key.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use roadmap_core::raw::RawGitHubEvent;
use roadmap_core::{
    pr_subject, Activity, ActivityId, ActivityKind, ComputationError, LinkKind, MappingError,
    SourceSystem, Task, TaskId, TaskLink,
};
use tracing::{debug, warn};

use crate::timestamp::parse_timestamp;

/// Issue keys such as `PAY-12` or `eng-7`, found in PR titles and branch names.
const ISSUE_KEY_PATTERN: &str = r"(?i)\b([a-z][a-z0-9]+-\d+)\b";

/// Output of normalizing the GitHub batch.
#[derive(Debug, Clone, Default)]
pub struct ActivityNormalization {
    /// Activities ordered by timestamp
    pub activities: Vec<Activity>,

    /// Events excluded because their kind is unknown or incomplete
    pub errors: Vec<MappingError>,
}

/// Map raw GitHub events into activities and resolve their linked task.
///
/// Linking is best-effort: an event links to a task only when the issue
/// keys in its title and branch name resolve to exactly one task.
pub fn normalize_activities(
    events: &[RawGitHubEvent],
    tasks: &[Task],
) -> Result<ActivityNormalization, ComputationError> {
    let keys = TaskKeyIndex::new(tasks)?;
    let mut out = ActivityNormalization::default();
    let mut seen: HashSet<ActivityId> = HashSet::new();

    for event in events {
        let timestamp = parse_timestamp(&format!("github:{}", event.repo), &event.timestamp)?;

        let Some(kind) = ActivityKind::parse(&event.event_kind) else {
            warn!("Excluding {} event with unknown kind {:?}", event.repo, event.event_kind);
            out.errors.push(MappingError {
                subject_id: format!("github:{}@{}", event.repo, event.timestamp.trim()),
                native_status: event.event_kind.clone(),
                backend: SourceSystem::GitHub,
            });
            continue;
        };

        let id = match (kind, event.pr_number) {
            (ActivityKind::Commit, _) => match event.sha.as_deref().map(str::trim) {
                Some(sha) if !sha.is_empty() => ActivityId(format!("github:{}@{}", event.repo, sha)),
                _ => ActivityId(format!("github:{}@{}", event.repo, timestamp.to_rfc3339())),
            },
            (_, Some(number)) => ActivityId(format!(
                "{}/{}@{}",
                pr_subject(&event.repo, number),
                kind,
                timestamp.timestamp()
            )),
            (_, None) => {
                warn!("Excluding {} {} event without a PR number", event.repo, kind);
                out.errors.push(MappingError {
                    subject_id: format!("github:{}@{}", event.repo, event.timestamp.trim()),
                    native_status: format!("{} (missing PR number)", event.event_kind),
                    backend: SourceSystem::GitHub,
                });
                continue;
            }
        };

        if !seen.insert(id.clone()) {
            debug!("Skipping duplicate event {}", id);
            continue;
        }

        let branch_ref = event
            .branch_ref
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);
        let linked_task_id = keys.resolve(&[event.title.as_str(), branch_ref.as_deref().unwrap_or("")]);

        out.activities.push(Activity {
            id,
            kind,
            repo: event.repo.clone(),
            timestamp,
            pr_number: event.pr_number,
            title: event.title.trim().to_string(),
            branch_ref,
            linked_task_id,
        });
    }

    out.activities
        .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    debug!(
        "Normalized {} activities ({} linked, {} excluded)",
        out.activities.len(),
        out.activities.iter().filter(|a| a.linked_task_id.is_some()).count(),
        out.errors.len()
    );
    Ok(out)
}

/// Record each linked activity on its task as a PR or commit link.
pub fn link_tasks(tasks: &mut [Task], activities: &[Activity]) {
    let positions: HashMap<&TaskId, usize> =
        tasks.iter().enumerate().map(|(i, t)| (&t.id, i)).collect();
    let mut links: Vec<(usize, TaskLink)> = Vec::new();

    for activity in activities {
        let Some(pos) = activity.linked_task_id.as_ref().and_then(|id| positions.get(id)) else {
            continue;
        };
        let link = match activity.kind {
            ActivityKind::Commit => TaskLink { kind: LinkKind::Commit, target: activity.id.to_string() },
            _ => match activity.pr_key() {
                Some(target) => TaskLink { kind: LinkKind::PullRequest, target },
                None => continue,
            },
        };
        links.push((*pos, link));
    }

    for (pos, link) in links {
        tasks[pos].add_link(link);
    }
}

/// Lookup from lowercase native id to the tasks carrying it.
struct TaskKeyIndex {
    pattern: Regex,
    by_key: HashMap<String, Vec<TaskId>>,
}

impl TaskKeyIndex {
    fn new(tasks: &[Task]) -> Result<Self, ComputationError> {
        let pattern = Regex::new(ISSUE_KEY_PATTERN)
            .map_err(|e| ComputationError::Invariant(format!("issue key pattern: {}", e)))?;

        let mut by_key: HashMap<String, Vec<TaskId>> = HashMap::new();
        for task in tasks {
            by_key
                .entry(task.id.native_id().to_ascii_lowercase())
                .or_default()
                .push(task.id.clone());
        }
        Ok(Self { pattern, by_key })
    }

    fn resolve(&self, texts: &[&str]) -> Option<TaskId> {
        let mut found: Vec<&TaskId> = Vec::new();
        for text in texts {
            for caps in self.pattern.captures_iter(text) {
                let key = caps[1].to_ascii_lowercase();
                for id in self.by_key.get(&key).into_iter().flatten() {
                    if !found.contains(&id) {
                        found.push(id);
                    }
                }
            }
        }
        match found.as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use roadmap_core::TaskStatus;

    fn event(kind: &str, pr: Option<u64>, title: &str, branch: Option<&str>, ts: &str) -> RawGitHubEvent {
        RawGitHubEvent {
            event_kind: kind.to_string(),
            repo: "acme/shop".to_string(),
            timestamp: ts.to_string(),
            pr_number: pr,
            title: title.to_string(),
            branch_ref: branch.map(str::to_string),
            sha: None,
        }
    }

    fn task(system: SourceSystem, id: &str) -> Task {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Task::new(system, id, id, TaskStatus::InProgress, now)
    }

    #[test]
    fn test_links_by_title_key() {
        let tasks = vec![task(SourceSystem::Jira, "PAY-12")];
        let events = vec![event("pr_opened", Some(7), "PAY-12: new checkout", None, "2024-05-01T10:00:00Z")];

        let out = normalize_activities(&events, &tasks).unwrap();

        assert_eq!(out.activities.len(), 1);
        assert_eq!(out.activities[0].kind, ActivityKind::PrOpened);
        assert_eq!(out.activities[0].linked_task_id, Some(TaskId::new(SourceSystem::Jira, "PAY-12")));
    }

    #[test]
    fn test_links_by_branch_key_case_insensitive() {
        let tasks = vec![task(SourceSystem::Linear, "ENG-4")];
        let events = vec![event("merged", Some(3), "Fix flaky test", Some("feature/eng-4-flaky"), "2024-05-01T10:00:00Z")];

        let out = normalize_activities(&events, &tasks).unwrap();
        assert_eq!(out.activities[0].kind, ActivityKind::PrMerged);
        assert_eq!(out.activities[0].linked_task_id, Some(TaskId::new(SourceSystem::Linear, "ENG-4")));
    }

    #[test]
    fn test_ambiguous_or_missing_key_stays_unlinked() {
        let tasks = vec![
            task(SourceSystem::Jira, "PAY-1"),
            task(SourceSystem::Linear, "PAY-1"),
            task(SourceSystem::Jira, "PAY-2"),
        ];
        let events = vec![
            event("pr_opened", Some(1), "PAY-1 refactor", None, "2024-05-01T10:00:00Z"),
            event("pr_opened", Some(2), "PAY-2 and PAY-9", Some("pay-3"), "2024-05-01T11:00:00Z"),
            event("pr_opened", Some(3), "No key here", None, "2024-05-01T12:00:00Z"),
        ];

        let out = normalize_activities(&events, &tasks).unwrap();
        assert_eq!(out.activities[0].linked_task_id, None);
        assert_eq!(out.activities[1].linked_task_id, Some(TaskId::new(SourceSystem::Jira, "PAY-2")));
        assert_eq!(out.activities[2].linked_task_id, None);
    }

    #[test]
    fn test_unknown_kind_and_missing_pr_number_are_mapping_errors() {
        let events = vec![
            event("labeled", Some(1), "x", None, "2024-05-01T10:00:00Z"),
            event("pr_merged", None, "x", None, "2024-05-01T10:00:00Z"),
            event("commit", None, "x", None, "2024-05-01T10:00:00Z"),
        ];
        let out = normalize_activities(&events, &[]).unwrap();
        assert_eq!(out.activities.len(), 1);
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors.iter().all(|e| e.backend == SourceSystem::GitHub));
        assert_eq!(out.errors[0].native_status, "labeled");
    }

    #[test]
    fn test_duplicate_commit_sha_is_skipped_and_output_sorted() {
        let mut late = event("commit", None, "b", None, "2024-05-02T10:00:00Z");
        late.sha = Some("abc".into());
        let mut dup = late.clone();
        dup.timestamp = "2024-05-02T11:00:00Z".into();
        let early = event("commit", None, "a", None, "2024-05-01T10:00:00Z");

        let out = normalize_activities(&[late, dup, early], &[]).unwrap();
        assert_eq!(out.activities.len(), 2);
        assert_eq!(out.activities[0].title, "a");
        assert_eq!(out.activities[1].id.0, "github:acme/shop@abc");
    }

    #[test]
    fn test_malformed_event_timestamp_is_fatal() {
        let events = vec![event("commit", None, "x", None, "not-a-date")];
        assert!(normalize_activities(&events, &[]).is_err());
    }

    #[test]
    fn test_link_tasks_adds_pr_and_commit_links() {
        let mut tasks = vec![task(SourceSystem::Jira, "PAY-12")];
        let mut commit = event("commit", None, "PAY-12 wip", None, "2024-05-01T09:00:00Z");
        commit.sha = Some("f00d".into());
        let events = vec![
            commit,
            event("pr_opened", Some(7), "PAY-12", None, "2024-05-01T10:00:00Z"),
            event("pr_merged", Some(7), "PAY-12", None, "2024-05-02T10:00:00Z"),
        ];
        let out = normalize_activities(&events, &tasks).unwrap();

        link_tasks(&mut tasks, &out.activities);

        let kinds: Vec<_> = tasks[0].links.iter().map(|l| (l.kind, l.target.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (LinkKind::Commit, "github:acme/shop@f00d"),
                (LinkKind::PullRequest, "github:acme/shop#7"),
            ]
        );
    }
}
