//! Engine configuration.
//!
//! Every section has defaults so a partial config file (or none at all)
//! still yields a usable engine. Loading the file is the caller's concern.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ComputationError;
use crate::id::SourceSystem;
use crate::task::TaskStatus;
use crate::velocity::Bucketing;

/// Configuration consumed by the normalization and metrics engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Native status vocabulary per backend
    #[serde(default)]
    pub status_mapping: StatusMappingTable,

    /// Blocker and progress rules
    #[serde(default)]
    pub rules: Rules,

    /// Velocity bucketing
    #[serde(default)]
    pub velocity: VelocityConfig,

    /// Trend classification
    #[serde(default)]
    pub trend: TrendConfig,

    /// Sync cycle timing
    #[serde(default)]
    pub sync: SyncConfig,
}

impl EngineConfig {
    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ComputationError> {
        self.status_mapping.validate()?;
        if self.velocity.window_size == 0 {
            return Err(ComputationError::InvalidConfig("velocity.window-size must be at least 1".into()));
        }
        if self.velocity.window_size > VelocityConfig::MAX_WINDOW_SIZE {
            return Err(ComputationError::InvalidConfig(format!(
                "velocity.window-size must be at most {}",
                VelocityConfig::MAX_WINDOW_SIZE
            )));
        }
        if self.trend.sample_count == 0 {
            return Err(ComputationError::InvalidConfig("trend.sample-count must be at least 1".into()));
        }
        // The newest bucket is still open, and a slope needs two closed samples.
        let needed = self.trend.sample_count.max(2) + 1;
        if self.velocity.window_size < needed {
            return Err(ComputationError::InvalidConfig(format!(
                "velocity.window-size must be at least {} for trend.sample-count {}",
                needed, self.trend.sample_count
            )));
        }
        if !self.trend.threshold_slope.is_finite() || self.trend.threshold_slope < 0.0 {
            return Err(ComputationError::InvalidConfig(
                "trend.threshold-slope must be a non-negative number".into(),
            ));
        }
        if self.sync.adapter_timeout_secs == 0 {
            return Err(ComputationError::InvalidConfig("sync.adapter-timeout-secs must be at least 1".into()));
        }
        Ok(())
    }
}

/// Per-backend table from native status to canonical status.
///
/// Keys are backend names (`jira`, `linear`, `asana`). Lookups ignore case
/// and surrounding whitespace of the native status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMappingTable(BTreeMap<String, BTreeMap<String, TaskStatus>>);

impl StatusMappingTable {
    /// Empty table: every native status is unmapped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Common vocabularies of Jira, Linear and Asana.
    pub fn standard() -> Self {
        use TaskStatus::*;

        let mut table = Self::new();
        for (native, status) in [
            ("To Do", Todo),
            ("Open", Todo),
            ("Backlog", Todo),
            ("Selected for Development", Todo),
            ("In Progress", InProgress),
            ("In Review", Review),
            ("Code Review", Review),
            ("Blocked", Blocked),
            ("Done", Done),
            ("Closed", Done),
            ("Resolved", Done),
        ] {
            table.insert(SourceSystem::Jira, native, status);
        }
        for (native, status) in [
            ("Triage", Todo),
            ("Backlog", Todo),
            ("Todo", Todo),
            ("In Progress", InProgress),
            ("In Review", Review),
            ("Blocked", Blocked),
            ("Done", Done),
            ("Canceled", Done),
            ("Duplicate", Done),
        ] {
            table.insert(SourceSystem::Linear, native, status);
        }
        for (native, status) in [
            ("Not Started", Todo),
            ("Incomplete", Todo),
            ("In Progress", InProgress),
            ("Review", Review),
            ("Waiting", Blocked),
            ("Blocked", Blocked),
            ("Completed", Done),
            ("Done", Done),
        ] {
            table.insert(SourceSystem::Asana, native, status);
        }
        table
    }

    /// Add or replace one mapping.
    pub fn insert(&mut self, backend: SourceSystem, native: &str, status: TaskStatus) {
        self.0
            .entry(backend.as_str().to_string())
            .or_default()
            .insert(native.trim().to_string(), status);
    }

    /// Canonical status for a native status, if mapped.
    pub fn lookup(&self, backend: SourceSystem, native: &str) -> Option<TaskStatus> {
        let native = native.trim();
        let table = self.0.get(backend.as_str())?;
        if let Some(status) = table.get(native) {
            return Some(*status);
        }
        table
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(native))
            .map(|(_, status)| *status)
    }

    /// Whether the table has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|t| t.is_empty())
    }

    /// Whether the table has any entry for the backend.
    pub fn covers(&self, backend: SourceSystem) -> bool {
        self.0.get(backend.as_str()).is_some_and(|t| !t.is_empty())
    }

    fn validate(&self) -> Result<(), ComputationError> {
        for backend in self.0.keys() {
            let system = backend
                .parse::<SourceSystem>()
                .map_err(|e| ComputationError::InvalidConfig(format!("status-mapping: {}", e)))?;
            if !system.is_project_management() {
                return Err(ComputationError::InvalidConfig(format!(
                    "status-mapping: {} has no task statuses",
                    system
                )));
            }
        }
        Ok(())
    }
}

/// Blocker detection and progress rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Rules {
    /// Days a PR may stay open before it is stale
    #[serde(default = "default_stale_days")]
    pub stale_days: i64,

    /// Days a task may wait on an unfinished dependency
    #[serde(default = "default_dependency_stale_days")]
    pub dependency_stale_days: i64,

    /// Days an open task may stay unassigned before it is reported
    #[serde(default)]
    pub unassigned_grace_days: i64,

    /// How feature completion is measured
    #[serde(default)]
    pub progress_method: ProgressMethod,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            stale_days: default_stale_days(),
            dependency_stale_days: default_dependency_stale_days(),
            unassigned_grace_days: 0,
            progress_method: ProgressMethod::default(),
        }
    }
}

/// How feature completion is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProgressMethod {
    /// Done tasks over all tasks
    #[default]
    #[serde(rename = "task-count", alias = "taskCount")]
    TaskCount,
    /// Done story points over all story points
    #[serde(rename = "story-points", alias = "storyPoints")]
    StoryPoints,
}

/// Velocity bucketing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VelocityConfig {
    /// Bucket size
    #[serde(default)]
    pub bucketing: Bucketing,

    /// Number of buckets in the series, including the open one
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

impl VelocityConfig {
    /// Largest accepted window.
    pub const MAX_WINDOW_SIZE: usize = 1000;
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            bucketing: Bucketing::default(),
            window_size: default_window_size(),
        }
    }
}

/// Trend classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrendConfig {
    /// Minimum slope magnitude that counts as a change
    #[serde(default = "default_threshold_slope")]
    pub threshold_slope: f64,

    /// Closed samples considered (k)
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            threshold_slope: default_threshold_slope(),
            sample_count: default_sample_count(),
        }
    }
}

/// Sync cycle timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncConfig {
    /// Upper bound on a single adapter fetch
    #[serde(default = "default_adapter_timeout_secs")]
    pub adapter_timeout_secs: u64,

    /// Period of scheduled cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl SyncConfig {
    /// Adapter timeout as a duration.
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }

    /// Schedule period as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_secs: default_adapter_timeout_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_stale_days() -> i64 {
    3
}

fn default_dependency_stale_days() -> i64 {
    7
}

fn default_window_size() -> usize {
    14
}

fn default_threshold_slope() -> f64 {
    0.1
}

fn default_sample_count() -> usize {
    4
}

fn default_adapter_timeout_secs() -> u64 {
    30
}

fn default_interval_secs() -> u64 {
    300
}
