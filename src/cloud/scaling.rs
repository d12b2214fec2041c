// ABOUTME: Fleet scaling API trait and its data types.
// ABOUTME: Covers desired/min/max capacity and per-instance lifecycle state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::CloudError;
use crate::types::{FleetId, InstanceId};

/// Desired/min/max capacity of a fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub desired: u32,
    pub min: u32,
    pub max: u32,
}

impl Capacity {
    pub fn new(desired: u32, min: u32, max: u32) -> Self {
        Self { desired, min, max }
    }

    /// Whether `min <= desired <= max` holds.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.desired && self.desired <= self.max
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "desired={} min={} max={}",
            self.desired, self.min, self.max
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Pending,
    InService,
    Standby,
    Terminating,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceHealth {
    Healthy,
    Unhealthy,
}

/// One compute instance of a fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub lifecycle: LifecycleState,
    pub health: InstanceHealth,
}

impl Instance {
    /// In service and reported healthy by the fleet.
    pub fn is_serving(&self) -> bool {
        self.lifecycle == LifecycleState::InService && self.health == InstanceHealth::Healthy
    }
}

/// Point-in-time description of a fleet.
#[derive(Debug, Clone)]
pub struct FleetDescription {
    pub fleet: FleetId,
    pub capacity: Capacity,
    pub instances: Vec<Instance>,
}

/// Capacity operations on pre-provisioned fleets.
///
/// Only this narrow surface is required; creating or destroying fleets is
/// handled by the provisioning tooling.
#[async_trait]
pub trait ScalingApi: Send + Sync {
    /// Current capacity and instances of a fleet.
    async fn describe_fleet(&self, fleet: &FleetId) -> Result<FleetDescription, CloudError>;

    /// Replace the fleet's capacity. Callers pass an ordered triple.
    async fn update_capacity(&self, fleet: &FleetId, capacity: Capacity)
    -> Result<(), CloudError>;
}
