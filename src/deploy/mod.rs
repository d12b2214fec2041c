// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports state markers, the Deployment struct, the orchestrator, and its reports.

mod deployment;
mod error;
mod inspect;
mod lease;
mod orchestrator;
mod report;
mod state;
mod transitions;

pub use deployment::{Abort, Deployment};
pub use error::{CloudResultExt, DeployError, DeployErrorKind, LeaseHolderInfo};
pub use lease::{DeployLease, LeaseInfo};
pub use orchestrator::{ActiveColor, CommandOptions, DeployRequest, Orchestrator};
pub use report::{
    ColorStatus, DeployOutcome, DeployPlan, DeployReport, FormerFleet, ReadinessStatus,
    ReleaseEntry, ReleaseListing, ScaleDownReport, ScaledFleet, StatusReport, SwitchReport,
    ValidationCheck, ValidationReport,
};
pub use state::{
    Completed, DeployState, Phase, Protected, Ready, Resolved, Scaled, Switched, Verified,
};
pub use transitions::{DiscoveryCheck, TransitionResult};
