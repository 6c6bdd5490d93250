//! Leveler configuration, read from a JSON file.
//!
//! ```json
//! {
//!   "source": { "kind": "json", "path": "gantt.json" },
//!   "structures": {
//!     "backend": { "id": 42, "query": "project = BE ORDER BY due", "parallel_projects": 2 }
//!   }
//! }
//! ```

use crate::calendar::DateId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "leveler.json";
pub const CONFIG_ENV_VAR: &str = "GANTT_LEVELER_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("no structure named '{0}' in configuration")]
    UnknownStructure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Json,
    Sqlite,
}

/// Where the Gantt data is read from and written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureConfig {
    pub id: i64,
    /// Task query; its results must come ordered by ascending finish date.
    pub query: String,
    /// Number of tasks allowed to run at the same time.
    pub parallel_projects: usize,
    /// Date to level from; zero or negative means today.
    #[serde(default)]
    pub start_date_id: DateId,
}

impl StructureConfig {
    pub fn start_date_id(&self) -> Option<DateId> {
        (self.start_date_id > 0).then_some(self.start_date_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelerConfig {
    pub source: SourceConfig,
    pub structures: BTreeMap<String, StructureConfig>,
}

impl LevelerConfig {
    /// Load a configuration file; a relative source path is resolved
    /// against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: LevelerConfig =
            serde_json::from_reader(file).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if config.source.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.source.path = dir.join(&config.source.path);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.structures.is_empty() {
            return Err(ConfigError::Invalid("no structures configured".into()));
        }
        for (name, structure) in &self.structures {
            if structure.query.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "structure '{name}' has an empty query"
                )));
            }
        }
        Ok(())
    }

    pub fn structure(&self, name: &str) -> Result<&StructureConfig, ConfigError> {
        self.structures
            .get(name)
            .ok_or_else(|| ConfigError::UnknownStructure(name.to_string()))
    }
}
