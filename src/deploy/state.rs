// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Each marker carries the data that exists at that point; Phase mirrors them at runtime.

use serde::Serialize;
use std::fmt;

use crate::cloud::Capacity;
use crate::fleet::ProtectionSnapshot;
use crate::health::HealthReport;
use crate::switch::SwitchOutcome;

/// Runtime view of where an orchestrator run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    Resolving,
    Protecting,
    Scaling,
    AwaitingHealth,
    DiscoveryCheck,
    Switching,
    Cleanup,
    Done,
    Aborting,
    RolledBack,
}

impl Phase {
    /// Whether a failure here leaves a scaled-up fleet that never took traffic.
    pub fn leaves_uncommitted_fleet(self) -> bool {
        matches!(
            self,
            Phase::Scaling | Phase::AwaitingHealth | Phase::DiscoveryCheck | Phase::Switching
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Resolving => "resolving",
            Phase::Protecting => "protecting",
            Phase::Scaling => "scaling",
            Phase::AwaitingHealth => "awaiting-health",
            Phase::DiscoveryCheck => "discovery-check",
            Phase::Switching => "switching",
            Phase::Cleanup => "cleanup",
            Phase::Done => "done",
            Phase::Aborting => "aborting",
            Phase::RolledBack => "rolled-back",
        };
        f.write_str(s)
    }
}

/// Implemented by every state marker.
pub trait DeployState {
    /// Phase of the transition that leaves this state.
    const EXIT_PHASE: Phase;
}

/// Color state read and both colors decided.
/// Available actions: `protect()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolved;

/// Active fleet frozen at its current size.
/// Available actions: `scale()`, `confirm_warm()`
#[derive(Debug, Clone)]
pub struct Protected {
    pub(crate) snapshot: ProtectionSnapshot,
}

/// Target fleet sized for the new version.
/// Available actions: `await_health()`
#[derive(Debug, Clone, Copy)]
pub struct Scaled {
    pub(crate) capacity: Capacity,
}

/// Every health signal passed.
/// Available actions: `check_discovery()`
#[derive(Debug, Clone)]
pub struct Verified {
    pub(crate) capacity: Capacity,
    pub(crate) report: HealthReport,
}

/// Safe to move traffic.
/// Available actions: `switch()`
#[derive(Debug, Clone)]
pub struct Ready {
    pub(crate) capacity: Capacity,
    pub(crate) report: HealthReport,
}

/// Traffic moved and color state recorded.
/// Available actions: `cleanup()`
#[derive(Debug, Clone)]
pub struct Switched {
    pub(crate) capacity: Capacity,
    pub(crate) report: HealthReport,
    pub(crate) switch: SwitchOutcome,
}

/// Former fleet released.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Completed {
    pub(crate) capacity: Capacity,
    pub(crate) report: HealthReport,
    pub(crate) switch: SwitchOutcome,
    pub(crate) former: Option<Capacity>,
    pub(crate) warnings: Vec<String>,
}

impl DeployState for Resolved {
    const EXIT_PHASE: Phase = Phase::Protecting;
}

impl DeployState for Protected {
    const EXIT_PHASE: Phase = Phase::Scaling;
}

impl DeployState for Scaled {
    const EXIT_PHASE: Phase = Phase::AwaitingHealth;
}

impl DeployState for Verified {
    const EXIT_PHASE: Phase = Phase::DiscoveryCheck;
}

impl DeployState for Ready {
    const EXIT_PHASE: Phase = Phase::Switching;
}

impl DeployState for Switched {
    const EXIT_PHASE: Phase = Phase::Cleanup;
}

impl DeployState for Completed {
    const EXIT_PHASE: Phase = Phase::Done;
}
