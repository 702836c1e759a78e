//! Identifiers for canonical entities.
//!
//! Task and feature identifiers are composite keys of the source system and
//! the backend's native id, rendered as `system:native_id`. They stay stable
//! across sync cycles so findings and samples can be compared run to run.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Backend a record originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSystem {
    /// Atlassian Jira
    Jira,
    /// Linear
    Linear,
    /// Asana
    Asana,
    /// GitHub source-control activity
    #[serde(rename = "github")]
    GitHub,
}

impl SourceSystem {
    /// All known backends.
    pub const ALL: [SourceSystem; 4] = [
        SourceSystem::Jira,
        SourceSystem::Linear,
        SourceSystem::Asana,
        SourceSystem::GitHub,
    ];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSystem::Jira => "jira",
            SourceSystem::Linear => "linear",
            SourceSystem::Asana => "asana",
            SourceSystem::GitHub => "github",
        }
    }

    /// Whether this backend is a project-management tool (as opposed to source control).
    pub fn is_project_management(&self) -> bool {
        !matches!(self, SourceSystem::GitHub)
    }
}

impl std::fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a backend name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown source system: {0}")]
pub struct UnknownSourceSystem(pub String);

impl std::str::FromStr for SourceSystem {
    type Err = UnknownSourceSystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jira" => Ok(SourceSystem::Jira),
            "linear" => Ok(SourceSystem::Linear),
            "asana" => Ok(SourceSystem::Asana),
            "github" => Ok(SourceSystem::GitHub),
            other => Err(UnknownSourceSystem(other.to_string())),
        }
    }
}

/// Stable composite identifier for a Task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Build from the source system and the backend's native id.
    pub fn new(system: SourceSystem, native_id: &str) -> Self {
        Self(format!("{}:{}", system, native_id.trim()))
    }

    /// Resolve a dependency reference written by a record of `origin`.
    pub fn from_reference(origin: SourceSystem, reference: &str) -> Self {
        let (system, native) = split_reference(origin, reference);
        Self::new(system, native)
    }

    /// Borrow the rendered key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Source system encoded in the key.
    pub fn source_system(&self) -> Option<SourceSystem> {
        self.0.split_once(':').and_then(|(system, _)| system.parse().ok())
    }

    /// Native id portion of the key.
    pub fn native_id(&self) -> &str {
        self.0.split_once(':').map(|(_, native)| native).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable composite identifier for a Feature (epic or project in the PM tool).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    /// Build from the source system and the backend's native id.
    pub fn new(system: SourceSystem, native_id: &str) -> Self {
        Self(format!("{}:{}", system, native_id.trim()))
    }

    /// Borrow the rendered key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve a cross-reference written by a record of `origin`.
    ///
    /// A qualified reference (`linear:PRJ-1`) names its own backend; a bare
    /// one (`PRJ-1`) is scoped to the backend the record came from.
    pub fn from_reference(origin: SourceSystem, reference: &str) -> Self {
        let (system, native) = split_reference(origin, reference);
        Self::new(system, native)
    }
}

fn split_reference(origin: SourceSystem, reference: &str) -> (SourceSystem, &str) {
    let reference = reference.trim();
    match reference.split_once(':') {
        Some((system, native)) => match system.parse::<SourceSystem>() {
            Ok(system) => (system, native),
            Err(_) => (origin, reference),
        },
        None => (origin, reference),
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a source-control Activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(pub String);

impl std::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(Ulid);

impl CycleId {
    /// Generate a new CycleId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for CycleId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_is_composite() {
        let id = TaskId::new(SourceSystem::Jira, " PAY-12 ");
        assert_eq!(id.as_str(), "jira:PAY-12");
        assert_eq!(id.source_system(), Some(SourceSystem::Jira));
        assert_eq!(id.native_id(), "PAY-12");
    }

    #[test]
    fn test_feature_reference_bare_is_scoped_to_origin() {
        let id = FeatureId::from_reference(SourceSystem::Linear, "PRJ-7");
        assert_eq!(id.as_str(), "linear:PRJ-7");
    }

    #[test]
    fn test_feature_reference_qualified_crosses_backends() {
        let id = FeatureId::from_reference(SourceSystem::Asana, "jira:EPIC-3");
        assert_eq!(id.as_str(), "jira:EPIC-3");
    }

    #[test]
    fn test_feature_reference_with_unknown_prefix_stays_local() {
        let id = FeatureId::from_reference(SourceSystem::Jira, "team:alpha");
        assert_eq!(id.as_str(), "jira:team:alpha");
    }

    #[test]
    fn test_source_system_parse() {
        assert_eq!("GitHub".parse::<SourceSystem>().unwrap(), SourceSystem::GitHub);
        assert!("gitlab".parse::<SourceSystem>().is_err());
    }
}
