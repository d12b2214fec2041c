// ABOUTME: External collaborator interfaces: scaling, load balancer, state store, artifacts.
// ABOUTME: Also exports the simulated backend that implements all of them.

mod artifacts;
mod balancer;
mod error;
mod scaling;
pub mod simulated;
mod state_store;

use std::sync::Arc;

pub use artifacts::{DiscoveryStore, Release, ReleaseCatalog};
pub use balancer::{LoadBalancerApi, TargetHealth, TargetState};
pub use error::{CloudError, CloudErrorKind};
pub use scaling::{
    Capacity, FleetDescription, Instance, InstanceHealth, LifecycleState, ScalingApi,
};
pub use simulated::{CloudDocument, SimulatedCloud};
pub use state_store::{ColorStateStore, StateRecord};

/// Handles to every collaborator an orchestrator run needs.
#[derive(Clone)]
pub struct Collaborators {
    pub scaling: Arc<dyn ScalingApi>,
    pub balancer: Arc<dyn LoadBalancerApi>,
    pub state: Arc<dyn ColorStateStore>,
    pub releases: Arc<dyn ReleaseCatalog>,
    pub discovery: Arc<dyn DiscoveryStore>,
}

impl Collaborators {
    /// Route every collaborator to one simulated cloud.
    pub fn simulated(cloud: Arc<SimulatedCloud>) -> Self {
        Self {
            scaling: cloud.clone(),
            balancer: cloud.clone(),
            state: cloud.clone(),
            releases: cloud.clone(),
            discovery: cloud,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
