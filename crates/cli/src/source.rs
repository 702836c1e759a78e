//! File-backed source adapter.
//!
//! Reads a backend export already in the adapter output shape. Useful for
//! replaying captured data and for running the engine without credentials.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use roadmap_core::raw::{ActivityBatch, ProjectBatch, RawBatch};
use roadmap_core::SourceSystem;
use roadmap_sync::{AdapterError, SourceAdapter};
use tracing::debug;

use crate::config::SourceConfig;

/// Adapter that reads one JSON file per fetch.
pub struct FileAdapter {
    backend: SourceSystem,
    path: PathBuf,
}

impl FileAdapter {
    /// Create an adapter for a backend export.
    pub fn new(backend: SourceSystem, path: impl Into<PathBuf>) -> Self {
        Self { backend, path: path.into() }
    }
}

impl From<&SourceConfig> for FileAdapter {
    fn from(source: &SourceConfig) -> Self {
        Self::new(source.backend, source.path.clone())
    }
}

#[async_trait]
impl SourceAdapter for FileAdapter {
    fn backend(&self) -> SourceSystem {
        self.backend
    }

    async fn fetch(&self) -> Result<RawBatch, AdapterError> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            let what = format!("{}: {}", self.path.display(), e);
            match e.kind() {
                ErrorKind::NotFound => AdapterError::Unreachable(what),
                ErrorKind::PermissionDenied => AdapterError::Unauthorized(what),
                _ => AdapterError::Other(what),
            }
        })?;

        let parse_error = |e: serde_json::Error| AdapterError::Other(format!("{}: {}", self.path.display(), e));
        let batch = if self.backend.is_project_management() {
            RawBatch::project(self.backend, serde_json::from_str::<ProjectBatch>(&contents).map_err(parse_error)?)
        } else {
            RawBatch::activity(serde_json::from_str::<ActivityBatch>(&contents).map_err(parse_error)?)
        };

        debug!("Read {} {} records from {}", batch.len(), self.backend, self.path.display());
        Ok(batch)
    }
}
