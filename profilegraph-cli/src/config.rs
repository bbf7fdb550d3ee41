// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! CLI configuration
//!
//! Loaded from an optional TOML file, then overridden by `PROFILEGRAPH_*`
//! environment variables, then by command-line flags.

use anyhow::{Context, Result};
use profilegraph_core::EngineConfig;
use profilegraph_ingest::OracleConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Some(StorageBackend::Memory),
            "file" | "disk" => Some(StorageBackend::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory of the file backend
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// `EnvFilter` directives
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("profilegraph"))
        .unwrap_or_else(|| PathBuf::from("./profilegraph-data"))
}

fn default_log_filter() -> String {
    "profilegraph=info".to_string()
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let config = match config_file {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            None => Self::default(),
        };

        config.merge_with_env()
    }

    /// Apply environment overrides
    fn merge_with_env(mut self) -> Result<Self> {
        if let Ok(dir) = std::env::var("PROFILEGRAPH_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(backend) = std::env::var("PROFILEGRAPH_STORE") {
            self.storage.backend = StorageBackend::parse(&backend)
                .with_context(|| format!("Unknown PROFILEGRAPH_STORE backend: {}", backend))?;
        }
        if let Ok(url) = std::env::var("PROFILEGRAPH_ORACLE_URL") {
            self.oracle.endpoint = url;
        }
        if let Ok(model) = std::env::var("PROFILEGRAPH_ORACLE_MODEL") {
            self.oracle.model = model;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.oracle.api_key = Some(key);
        }
        if let Ok(filter) = std::env::var("PROFILEGRAPH_LOG") {
            self.log.filter = filter;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.engine.acceptance_threshold, 0.7);
        assert_eq!(config.log.filter, "profilegraph=info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[storage]
backend = "memory"

[engine]
acceptance_threshold = 0.8
summary_top_n = 3

[oracle]
model = "local-model"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.engine.acceptance_threshold, 0.8);
        assert_eq!(config.engine.summary_top_n, 3);
        assert_eq!(config.engine.recent_observations_capacity, 5);
        assert_eq!(config.oracle.model, "local-model");
        assert_eq!(config.oracle.temperature, 0.3);
    }

    #[test]
    fn test_invalid_engine_section() {
        let config = AppConfig {
            engine: EngineConfig {
                summary_top_n: 0,
                ..EngineConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/profilegraph.toml"))).is_err());
    }
}
