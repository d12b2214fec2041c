// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: State types carry their own data for compile-time guarantees.

use crate::signal::Interrupt;
use crate::types::{Color, EnvironmentName, Version};

use super::error::DeployError;
use super::state::{
    Completed, DeployState, Phase, Protected, Ready, Resolved, Scaled, Switched, Verified,
};

/// A deployment in progress, parameterized by its current state.
///
/// The state type parameter `S` carries state-specific data (the protection
/// snapshot, the capacity the target fleet was given, the health report)
/// directly in the state type, so a switch can only be attempted on a
/// deployment whose target has been verified.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) environment: EnvironmentName,
    pub(crate) active: Color,
    pub(crate) target: Color,
    pub(crate) version: Option<Version>,
    pub(crate) state: S,
}

/// Why a run stopped, and in which phase.
#[derive(Debug)]
pub struct Abort {
    pub phase: Phase,
    pub error: DeployError,
}

impl Deployment<Resolved> {
    /// Start a deployment that moves traffic from `active` to `target`.
    pub fn new(
        environment: EnvironmentName,
        active: Color,
        target: Color,
        version: Option<Version>,
    ) -> Self {
        Deployment {
            environment,
            active,
            target,
            version,
            state: Resolved,
        }
    }
}

impl<S> Deployment<S> {
    pub fn environment(&self) -> &EnvironmentName {
        &self.environment
    }

    /// Color serving traffic when the deployment started.
    pub fn active(&self) -> Color {
        self.active
    }

    /// Color being brought up.
    pub fn target(&self) -> Color {
        self.target
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }
}

impl<S: DeployState> Deployment<S> {
    /// Phase the next transition runs in.
    pub fn next_phase(&self) -> Phase {
        S::EXIT_PHASE
    }

    /// Stop here with `error`.
    pub fn abort(self, error: DeployError) -> Abort {
        Abort {
            phase: S::EXIT_PHASE,
            error,
        }
    }

    /// Stop if an interrupt has arrived since the last step.
    pub fn checkpoint(self, interrupt: &Interrupt) -> Result<Self, Abort> {
        if interrupt.is_triggered() {
            let phase = S::EXIT_PHASE;
            return Err(self.abort(DeployError::Interrupted { phase }));
        }
        Ok(self)
    }
}

impl<S: DeployState> From<(Deployment<S>, DeployError)> for Abort {
    fn from((deployment, error): (Deployment<S>, DeployError)) -> Self {
        deployment.abort(error)
    }
}

impl Deployment<Protected> {
    pub fn snapshot(&self) -> &crate::fleet::ProtectionSnapshot {
        &self.state.snapshot
    }
}

impl Deployment<Scaled> {
    pub fn capacity(&self) -> crate::cloud::Capacity {
        self.state.capacity
    }
}

impl Deployment<Verified> {
    pub fn report(&self) -> &crate::health::HealthReport {
        &self.state.report
    }
}

impl Deployment<Ready> {
    pub fn report(&self) -> &crate::health::HealthReport {
        &self.state.report
    }
}

impl Deployment<Switched> {
    pub fn switch_outcome(&self) -> &crate::switch::SwitchOutcome {
        &self.state.switch
    }
}

impl Deployment<Completed> {
    pub fn warnings(&self) -> &[String] {
        &self.state.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DeployErrorKind;

    fn deployment() -> Deployment<Resolved> {
        Deployment::new(
            EnvironmentName::new("beta").unwrap(),
            Color::Blue,
            Color::Green,
            Some(Version::new("v123").unwrap()),
        )
    }

    #[test]
    fn new_deployment_exposes_colors_and_version() {
        let d = deployment();
        assert_eq!(d.active(), Color::Blue);
        assert_eq!(d.target(), Color::Green);
        assert_eq!(d.version().map(Version::as_str), Some("v123"));
        assert_eq!(d.next_phase(), Phase::Protecting);
    }

    #[test]
    fn checkpoint_aborts_once_interrupted() {
        let (trigger, interrupt) = Interrupt::channel();
        let d = deployment().checkpoint(&interrupt).unwrap();

        trigger.trigger();
        let abort = d.checkpoint(&interrupt).unwrap_err();
        assert_eq!(abort.phase, Phase::Protecting);
        assert_eq!(abort.error.kind(), DeployErrorKind::Interrupted);
    }
}
