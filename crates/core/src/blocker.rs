//! Blocker findings.

use serde::{Deserialize, Serialize};
use crate::Time;

/// Something that is blocking progress, found during one sync cycle.
///
/// Findings are not carried between cycles: a finding missing from the
/// latest cycle is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockerFinding {
    /// Task id or PR reference (`github:repo#n`)
    pub subject_id: String,

    /// Rule that fired
    pub rule: BlockerRule,

    /// Whole days the subject has been in the blocking condition
    pub age_in_days: i64,

    /// When the cycle detected it
    pub detected_at: Time,

    /// Severity
    pub severity: Severity,

    /// Human-readable description
    pub detail: String,
}

/// Blocker detection rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerRule {
    /// A pull request open longer than the stale threshold
    StalePr,
    /// An open task with nobody assigned
    UnassignedIssue,
    /// A task whose status is blocked
    BlockedStatus,
    /// A task waiting on an unfinished dependency for too long
    StaleDependency,
}

impl BlockerRule {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockerRule::StalePr => "stale_pr",
            BlockerRule::UnassignedIssue => "unassigned_issue",
            BlockerRule::BlockedStatus => "blocked_status",
            BlockerRule::StaleDependency => "stale_dependency",
        }
    }
}

impl std::fmt::Display for BlockerRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth a look
    Medium,
    /// Needs attention now
    High,
}

impl Severity {
    /// Findings older than this many days are high severity.
    pub const HIGH_AFTER_DAYS: i64 = 7;

    /// Severity for a finding of the given age.
    pub fn for_age(age_in_days: i64) -> Self {
        if age_in_days > Self::HIGH_AFTER_DAYS {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Severity of a finding from `rule` at the given age.
    ///
    /// Unassigned tasks stay medium however old they are.
    pub fn for_finding(rule: BlockerRule, age_in_days: i64) -> Self {
        match rule {
            BlockerRule::UnassignedIssue => Severity::Medium,
            _ => Self::for_age(age_in_days),
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}
