//! Headline health numbers.

use chrono::Duration;
use roadmap_core::{Activity, ActivityKind, BlockerFinding, HealthSummary, Severity, Task, TaskStatus, Time};

use crate::blocker::open_pull_requests;

/// Days covered by the recent-commit figures.
pub const RECENT_COMMIT_DAYS: i64 = 7;

/// Build the summary for one cycle.
pub fn summarize(
    tasks: &[Task],
    activities: &[Activity],
    orphan_tasks: usize,
    blockers: &[BlockerFinding],
    now: Time,
) -> HealthSummary {
    let since = now - Duration::days(RECENT_COMMIT_DAYS);
    let commits: Vec<&Activity> = activities.iter().filter(|a| a.kind == ActivityKind::Commit).collect();
    let commits_last_7d = commits
        .iter()
        .filter(|a| a.timestamp > since && a.timestamp <= now)
        .count();

    HealthSummary {
        open_prs: open_pull_requests(activities).len(),
        open_tasks: tasks.iter().filter(|t| !t.status.is_done()).count(),
        in_progress_tasks: tasks.iter().filter(|t| t.status == TaskStatus::InProgress).count(),
        done_tasks: tasks.iter().filter(|t| t.status.is_done()).count(),
        orphan_tasks,
        blockers: blockers.len(),
        high_severity_blockers: blockers.iter().filter(|b| b.severity == Severity::High).count(),
        medium_severity_blockers: blockers.iter().filter(|b| b.severity == Severity::Medium).count(),
        commits_last_7d,
        commits_per_day: commits_last_7d as f64 / RECENT_COMMIT_DAYS as f64,
        total_commits: commits.len(),
    }
}
