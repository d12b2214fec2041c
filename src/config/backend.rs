// ABOUTME: Collaborator backend selection.
// ABOUTME: The simulated backend keeps its cloud document at a configurable path.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "provider", rename_all = "kebab-case")]
pub enum BackendConfig {
    /// JSON document standing in for the scaling, load balancer and state APIs.
    Simulated {
        #[serde(default = "default_document_path")]
        path: PathBuf,
    },
}

fn default_document_path() -> PathBuf {
    PathBuf::from(".fleetswap/cloud.json")
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Simulated {
            path: default_document_path(),
        }
    }
}
