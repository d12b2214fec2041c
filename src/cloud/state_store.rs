// ABOUTME: Key/value state store trait holding the per-environment color state.
// ABOUTME: Also stores the deploy lease record with put-if-absent semantics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CloudError;
use crate::types::EnvironmentName;

/// Raw color-state fields as persisted. Either field may be missing or
/// malformed; validation happens when the orchestrator resolves state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_target: Option<String>,
}

/// Durable per-environment state. Last write wins.
#[async_trait]
pub trait ColorStateStore: Send + Sync {
    async fn load(&self, env: &EnvironmentName) -> Result<Option<StateRecord>, CloudError>;

    /// Persist both fields in a single write.
    async fn save(&self, env: &EnvironmentName, record: &StateRecord) -> Result<(), CloudError>;

    /// Store the lease record unless one already exists. Returns false if held.
    async fn create_lease(&self, env: &EnvironmentName, record: &str)
    -> Result<bool, CloudError>;

    async fn read_lease(&self, env: &EnvironmentName) -> Result<Option<String>, CloudError>;

    async fn remove_lease(&self, env: &EnvironmentName) -> Result<(), CloudError>;
}
