//! Plain-text rendering of a snapshot.

use std::fmt::Write;

use roadmap_core::{Severity, Snapshot, SyncState};

/// Render the headline view of a snapshot.
pub fn render(snapshot: &Snapshot, state: SyncState, last_sync_error: Option<&str>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "State: {}", state);
    if let Some(error) = last_sync_error {
        let _ = writeln!(out, "Last sync error: {}", error);
    }
    if snapshot.is_initial() {
        let _ = writeln!(out, "No snapshot yet");
        return out;
    }

    if let (Some(cycle), Some(at)) = (&snapshot.cycle_id, snapshot.completed_at) {
        let _ = writeln!(out, "Cycle {} at {}", cycle, at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    let backends: Vec<&str> = snapshot.backends.iter().map(|b| b.as_str()).collect();
    let _ = writeln!(out, "Backends: {}", backends.join(", "));

    let s = &snapshot.summary;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Tasks: {} open, {} in progress, {} done, {} orphan",
        s.open_tasks, s.in_progress_tasks, s.done_tasks, s.orphan_tasks
    );
    let _ = writeln!(out, "Open PRs: {}", s.open_prs);
    let _ = writeln!(
        out,
        "Commits: {} in last 7 days ({:.1}/day), {} total",
        s.commits_last_7d, s.commits_per_day, s.total_commits
    );
    let _ = writeln!(
        out,
        "Blockers: {} ({} high, {} medium)",
        s.blockers,
        s.blockers_at(Severity::High),
        s.blockers_at(Severity::Medium)
    );
    let _ = writeln!(out, "Velocity trend: {}", snapshot.trend.as_str());

    if !snapshot.features.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Features:");
        for feature in &snapshot.features {
            let _ = writeln!(
                out,
                "  {:>6.2}%  {} ({} tasks)",
                feature.progress_percent,
                feature.name,
                feature.task_ids.len()
            );
        }
    }

    if !snapshot.blockers.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Blockers:");
        for finding in &snapshot.blockers {
            let _ = writeln!(
                out,
                "  [{}] {} {}",
                finding.severity.as_str(),
                finding.rule.as_str(),
                finding.detail
            );
        }
    }

    if !snapshot.issues.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Issues:");
        for issue in &snapshot.issues {
            let _ = writeln!(out, "  {}", issue);
        }
    }

    out
}
