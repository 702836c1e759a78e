//! Activity model - source-control events relevant to velocity and blocking.

use crate::id::{ActivityId, TaskId};
use crate::Time;
use serde::{Deserialize, Serialize};

/// A GitHub event normalized into the canonical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Unique identifier
    pub id: ActivityId,

    /// What happened
    pub kind: ActivityKind,

    /// Repository (`owner/name`)
    pub repo: String,

    /// When it happened
    pub timestamp: Time,

    /// Pull request number for PR events
    pub pr_number: Option<u64>,

    /// PR title or commit headline
    pub title: String,

    /// Branch the event refers to
    pub branch_ref: Option<String>,

    /// Task resolved from the title or branch, best-effort
    pub linked_task_id: Option<TaskId>,
}

impl Activity {
    /// Key identifying the pull request this event belongs to.
    pub fn pr_key(&self) -> Option<String> {
        self.pr_number.map(|number| pr_subject(&self.repo, number))
    }

    /// Whether this event ends a pull request's open life.
    pub fn closes_pr(&self) -> bool {
        matches!(self.kind, ActivityKind::PrMerged | ActivityKind::PrClosed)
    }
}

/// Subject id used for a pull request.
pub fn pr_subject(repo: &str, number: u64) -> String {
    format!("github:{}#{}", repo, number)
}

/// Kinds of source-control activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// A commit landed
    Commit,
    /// A pull request was opened
    PrOpened,
    /// A pull request was merged
    PrMerged,
    /// A pull request was closed without merging
    PrClosed,
}

impl ActivityKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Commit => "commit",
            ActivityKind::PrOpened => "pr_opened",
            ActivityKind::PrMerged => "pr_merged",
            ActivityKind::PrClosed => "pr_closed",
        }
    }

    /// Parse a native GitHub event kind.
    pub fn parse(native: &str) -> Option<Self> {
        match native.trim().to_ascii_lowercase().as_str() {
            "commit" | "push" => Some(ActivityKind::Commit),
            "pr_opened" | "opened" | "reopened" => Some(ActivityKind::PrOpened),
            "pr_merged" | "merged" => Some(ActivityKind::PrMerged),
            "pr_closed" | "closed" => Some(ActivityKind::PrClosed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
