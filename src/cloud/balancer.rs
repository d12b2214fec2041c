// ABOUTME: Load balancer API trait and routing health types.
// ABOUTME: Reads and rewrites listener/rule forward targets and reports per-instance health.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::CloudError;
use crate::types::{InstanceId, ListenerId, RuleId, TargetId};

/// Routing health of one instance in a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Initial,
    Healthy,
    Unhealthy,
    Draining,
    Unused,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetState::Initial => "initial",
            TargetState::Healthy => "healthy",
            TargetState::Unhealthy => "unhealthy",
            TargetState::Draining => "draining",
            TargetState::Unused => "unused",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHealth {
    pub instance: InstanceId,
    pub state: TargetState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Routing operations on the load balancer fronting both fleets.
#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    /// Target a listener forwards to by default.
    async fn listener_target(&self, listener: &ListenerId) -> Result<TargetId, CloudError>;

    async fn set_listener_target(
        &self,
        listener: &ListenerId,
        target: &TargetId,
    ) -> Result<(), CloudError>;

    /// Target a path-scoped rule forwards to.
    async fn rule_target(&self, rule: &RuleId) -> Result<TargetId, CloudError>;

    async fn set_rule_target(&self, rule: &RuleId, target: &TargetId) -> Result<(), CloudError>;

    /// Per-instance routing health of every registered member.
    async fn target_health(&self, target: &TargetId) -> Result<Vec<TargetHealth>, CloudError>;

    async fn target_exists(&self, target: &TargetId) -> Result<bool, CloudError>;
}
