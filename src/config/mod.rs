// ABOUTME: Configuration types and parsing for fleetswap.yml.
// ABOUTME: Handles YAML parsing, discovery of the config file, and environment lookup.

mod backend;
mod deserialize;
mod environment;
mod health;
mod init;

pub use backend::BackendConfig;
pub use environment::{ColorConfig, EnvironmentConfig, ReadinessConfig, RoutingConfig};
pub use health::HealthConfig;
pub use init::init_config;

use crate::error::{Error, Result};
use crate::types::EnvironmentName;
use deserialize::deserialize_environments;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "fleetswap.yml";
pub const CONFIG_FILENAME_ALT: &str = "fleetswap.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".fleetswap/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(deserialize_with = "deserialize_environments")]
    pub environments: BTreeMap<EnvironmentName, EnvironmentConfig>,

    /// Directory relative backend paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        // `.fleetswap/config.yml` resolves against the project root, not `.fleetswap/`.
        let dir = path.parent().unwrap_or(Path::new("."));
        config.base_dir = if dir.ends_with(".fleetswap") {
            dir.parent().unwrap_or(dir).to_path_buf()
        } else {
            dir.to_path_buf()
        };
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn environment(&self, name: &EnvironmentName) -> Result<&EnvironmentConfig> {
        self.environments
            .get(name)
            .ok_or_else(|| Error::UnknownEnvironment(name.to_string()))
    }

    /// Health timings for an environment, honoring its override.
    pub fn health_for(&self, name: &EnvironmentName) -> Result<HealthConfig> {
        let env = self.environment(name)?;
        Ok(env.health.clone().unwrap_or_else(|| self.health.clone()))
    }

    /// Location of the simulated cloud document.
    pub fn document_path(&self) -> PathBuf {
        match &self.backend {
            BackendConfig::Simulated { path } if path.is_relative() => self.base_dir.join(path),
            BackendConfig::Simulated { path } => path.clone(),
        }
    }
}
