//! Task model - the canonical unit of work.

use serde::{Deserialize, Serialize};
use crate::id::{SourceSystem, TaskId};
use crate::Time;

/// A task normalized from any project-management backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Composite identifier (`system:native_id`)
    pub id: TaskId,

    /// Task title
    pub title: String,

    /// Canonical status
    pub status: TaskStatus,

    /// Assignee identity, if any
    pub assignee: Option<String>,

    /// Story point estimate
    pub story_points: Option<f64>,

    /// Backend the task came from
    pub source_system: SourceSystem,

    /// Last update timestamp
    pub last_updated: Time,

    /// Dependencies, linked pull requests and commits
    pub links: Vec<TaskLink>,
}

impl Task {
    /// Create a task with no assignee, estimate, or links.
    pub fn new(
        source_system: SourceSystem,
        native_id: &str,
        title: impl Into<String>,
        status: TaskStatus,
        last_updated: Time,
    ) -> Self {
        Self {
            id: TaskId::new(source_system, native_id),
            title: title.into(),
            status,
            assignee: None,
            story_points: None,
            source_system,
            last_updated,
            links: Vec::new(),
        }
    }

    /// Add a link unless an identical one is already present.
    pub fn add_link(&mut self, link: TaskLink) {
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }

    /// Tasks this one declares a dependency on.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.links
            .iter()
            .filter(|l| l.kind == LinkKind::DependsOn)
            .map(|l| l.target.as_str())
    }

    /// Whole days since the last update, never negative.
    pub fn age_days(&self, now: Time) -> i64 {
        now.signed_duration_since(self.last_updated).num_days().max(0)
    }
}

/// Canonical status vocabulary every backend status maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started
    Todo,
    /// Being worked on
    InProgress,
    /// Awaiting review
    Review,
    /// Explicitly blocked
    Blocked,
    /// Completed
    Done,
}

impl TaskStatus {
    /// All canonical statuses.
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Blocked,
        TaskStatus::Done,
    ];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        }
    }

    /// Whether the task counts as completed.
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("not a canonical status: {}", s))
    }
}

/// A reference from a task to something else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskLink {
    /// Type of relationship
    pub kind: LinkKind,

    /// Target: a task id for dependencies, `github:repo#n` for PRs, `github:repo@sha` for commits
    pub target: String,
}

impl TaskLink {
    /// Dependency on another task.
    pub fn depends_on(task: &TaskId) -> Self {
        Self { kind: LinkKind::DependsOn, target: task.to_string() }
    }
}

/// Types of task references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// This task cannot finish before `target`
    DependsOn,
    /// A pull request implementing this task
    PullRequest,
    /// A commit referencing this task
    Commit,
}
