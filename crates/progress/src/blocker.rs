//! Blocker detection.
//!
//! Four independent rules run over the task pool and the activity stream:
//! - Stale pull requests (opened, never merged or closed)
//! - Unassigned open tasks
//! - Tasks in the blocked status
//! - Tasks waiting too long on an unfinished dependency
//!
//! Findings are rebuilt from scratch on every call.

use std::collections::{BTreeMap, HashMap};

use roadmap_core::{
    Activity, ActivityKind, BlockerFinding, BlockerRule, Rules, Severity, Task,
    TaskStatus, Time,
};
use tracing::debug;

/// A pull request with an opening and no later merge or close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPullRequest {
    /// Subject id (`github:repo#n`)
    pub subject_id: String,

    /// Pull request number
    pub number: u64,

    /// Title from the opening event
    pub title: String,

    /// When it was (last re)opened
    pub opened_at: Time,
}

/// Blocker detector configured with a set of rules.
#[derive(Debug, Clone, Default)]
pub struct BlockerDetector {
    rules: Rules,
}

impl BlockerDetector {
    /// Create a new blocker detector.
    pub fn new(rules: Rules) -> Self {
        Self { rules }
    }

    /// Run every rule and return the findings, oldest first.
    pub fn detect(&self, tasks: &[Task], activities: &[Activity], now: Time) -> Vec<BlockerFinding> {
        let mut findings = Vec::new();

        findings.extend(self.detect_stale_prs(activities, now));
        findings.extend(self.detect_unassigned(tasks, now));
        findings.extend(self.detect_blocked_status(tasks, now));
        findings.extend(self.detect_stale_dependencies(tasks, now));

        findings.sort_by(|a, b| {
            b.age_in_days
                .cmp(&a.age_in_days)
                .then_with(|| a.subject_id.cmp(&b.subject_id))
                .then_with(|| a.rule.cmp(&b.rule))
        });

        debug!("Detected {} blockers", findings.len());
        findings
    }

    fn detect_stale_prs(&self, activities: &[Activity], now: Time) -> Vec<BlockerFinding> {
        open_pull_requests(activities)
            .into_iter()
            .filter_map(|pr| {
                let age = whole_days(pr.opened_at, now);
                if age <= self.rules.stale_days {
                    return None;
                }
                Some(finding(
                    pr.subject_id,
                    BlockerRule::StalePr,
                    age,
                    now,
                    format!("PR #{} open for {} days", pr.number, age),
                ))
            })
            .collect()
    }

    fn detect_unassigned(&self, tasks: &[Task], now: Time) -> Vec<BlockerFinding> {
        tasks
            .iter()
            .filter(|t| !t.status.is_done() && t.assignee.is_none())
            .filter_map(|t| {
                let age = t.age_days(now);
                if age < self.rules.unassigned_grace_days {
                    return None;
                }
                Some(finding(
                    t.id.to_string(),
                    BlockerRule::UnassignedIssue,
                    age,
                    now,
                    format!("{} unassigned for {} days", t.id, age),
                ))
            })
            .collect()
    }

    fn detect_blocked_status(&self, tasks: &[Task], now: Time) -> Vec<BlockerFinding> {
        tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Blocked)
            .map(|t| {
                let age = t.age_days(now);
                finding(
                    t.id.to_string(),
                    BlockerRule::BlockedStatus,
                    age,
                    now,
                    format!("{} blocked for {} days", t.id, age),
                )
            })
            .collect()
    }

    fn detect_stale_dependencies(&self, tasks: &[Task], now: Time) -> Vec<BlockerFinding> {
        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        tasks
            .iter()
            .filter(|t| !t.status.is_done())
            .filter_map(|t| {
                let age = t.age_days(now);
                if age <= self.rules.dependency_stale_days {
                    return None;
                }
                let waiting_on: Vec<&str> = t
                    .dependencies()
                    .filter(|dep| by_id.get(dep).is_some_and(|d| !d.status.is_done()))
                    .collect();
                if waiting_on.is_empty() {
                    return None;
                }
                Some(finding(
                    t.id.to_string(),
                    BlockerRule::StaleDependency,
                    age,
                    now,
                    format!("{} waiting on {} for {} days", t.id, waiting_on.join(", "), age),
                ))
            })
            .collect()
    }
}

/// Detect blockers with the given rules.
pub fn detect(tasks: &[Task], activities: &[Activity], now: Time, rules: &Rules) -> Vec<BlockerFinding> {
    BlockerDetector::new(rules.clone()).detect(tasks, activities, now)
}

/// Pull requests still open at the end of the activity stream.
///
/// A merge or close at or after the latest opening ends the PR; a reopen
/// after a close starts it again.
pub fn open_pull_requests(activities: &[Activity]) -> Vec<OpenPullRequest> {
    let mut by_pr: BTreeMap<String, Vec<&Activity>> = BTreeMap::new();
    for activity in activities.iter().filter(|a| a.kind != ActivityKind::Commit) {
        if let Some(key) = activity.pr_key() {
            by_pr.entry(key).or_default().push(activity);
        }
    }

    let mut open = Vec::new();
    for (subject_id, mut events) in by_pr {
        // A close sharing the opening's timestamp still closes it.
        events.sort_by_key(|a| (a.timestamp, a.closes_pr()));

        let mut opened: Option<&Activity> = None;
        for event in events {
            if event.closes_pr() {
                opened = None;
            } else if opened.is_none() {
                opened = Some(event);
            }
        }

        if let Some(event) = opened {
            open.push(OpenPullRequest {
                number: event.pr_number.unwrap_or_default(),
                title: event.title.clone(),
                opened_at: event.timestamp,
                subject_id,
            });
        }
    }
    open
}

fn finding(subject_id: String, rule: BlockerRule, age: i64, now: Time, detail: String) -> BlockerFinding {
    BlockerFinding {
        subject_id,
        rule,
        age_in_days: age,
        detected_at: now,
        severity: Severity::for_finding(rule, age),
        detail,
    }
}

fn whole_days(since: Time, now: Time) -> i64 {
    now.signed_duration_since(since).num_days().max(0)
}
