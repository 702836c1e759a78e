use anyhow::{Context, Result};
use roadmap_core::{EngineConfig, SourceSystem, StatusMappingTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure for the roadmap CLI.
///
/// Engine settings sit at the top level; the files the CLI reads backend
/// data from are listed under `[[sources]]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Engine configuration
    #[serde(flatten)]
    pub engine: EngineConfig,

    /// Where persisted state lives
    #[serde(default)]
    pub storage: StorageConfig,

    /// Backend data files
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Directory holding the persisted snapshot
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

/// One backend export read by the file adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Backend the file belongs to
    pub backend: SourceSystem,

    /// JSON file in the adapter output shape
    pub path: PathBuf,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".roadmap")
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./roadmap.toml
    /// 3. ./roadmap.json
    ///
    /// Returns default configuration if no file is found. A config without a
    /// status mapping gets the standard Jira/Linear/Asana vocabulary.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let found = ["roadmap.toml", "roadmap.json"]
                    .iter()
                    .map(Path::new)
                    .find(|p| p.exists());
                match found {
                    Some(path) => Self::load_from_path(path)?,
                    None => Self::default(),
                }
            }
        };

        if config.engine.status_mapping.is_empty() {
            config.engine.status_mapping = StatusMappingTable::standard();
        }
        config.engine.validate().context("Invalid engine configuration")?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()).unwrap_or("") {
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            _ => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
        }
    }

    /// Configuration written by `roadmap init`.
    pub fn template() -> Self {
        let mut config = Self::default();
        config.engine.status_mapping = StatusMappingTable::standard();
        config.sources = vec![
            SourceConfig { backend: SourceSystem::Jira, path: PathBuf::from("data/jira.json") },
            SourceConfig { backend: SourceSystem::GitHub, path: PathBuf::from("data/github.json") },
        ];
        config
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
