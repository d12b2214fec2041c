// ABOUTME: Release catalog and discovery artifact store traits.
// ABOUTME: Lists deployable versions and tracks per-environment readiness artifacts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CloudError;
use crate::types::{Color, EnvironmentName, Version};

/// A built version available for deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub version: Version,
    pub branch: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReleaseCatalog: Send + Sync {
    /// Releases, newest first, optionally restricted to one branch.
    async fn list_releases(&self, branch: Option<&str>) -> Result<Vec<Release>, CloudError>;

    async fn assigned_version(
        &self,
        env: &EnvironmentName,
        color: Color,
    ) -> Result<Option<Version>, CloudError>;

    /// Record the version a color's instances boot with.
    async fn assign_version(
        &self,
        env: &EnvironmentName,
        color: Color,
        version: &Version,
    ) -> Result<(), CloudError>;
}

/// Readiness ("discovery") artifacts: proof that a version has enumerated
/// everything it can serve in a given environment.
#[async_trait]
pub trait DiscoveryStore: Send + Sync {
    async fn artifact_exists(
        &self,
        env: &EnvironmentName,
        version: &Version,
    ) -> Result<bool, CloudError>;

    async fn copy_artifact(
        &self,
        from: &EnvironmentName,
        to: &EnvironmentName,
        version: &Version,
    ) -> Result<(), CloudError>;
}
