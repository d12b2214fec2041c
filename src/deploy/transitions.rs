// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::time::Duration;

use crate::cloud::{Capacity, DiscoveryStore, ReleaseCatalog};
use crate::config::{ColorConfig, EnvironmentConfig, HealthConfig};
use crate::fleet::{CapacityRequest, FleetController, ProtectionHandle};
use crate::health::{HealthReport, HealthVerifier, PollSettings, ReadinessPlan};
use crate::prompt::Confirmation;
use crate::signal::Interrupt;
use crate::switch::TrafficSwitch;

use super::Deployment;
use super::error::{CloudResultExt, DeployError};
use super::report::{DeployReport, FormerFleet};
use super::state::{Completed, Phase, Protected, Ready, Resolved, Scaled, Switched, Verified};

/// Result type for transitions that hand the deployment back on failure.
pub type TransitionResult<T, S> = Result<Deployment<T>, (Deployment<S>, DeployError)>;

/// Everything the discovery check consults.
pub struct DiscoveryCheck<'c> {
    pub env: &'c EnvironmentConfig,
    pub discovery: &'c dyn DiscoveryStore,
    pub confirm: &'c dyn Confirmation,
    pub interrupt: &'c Interrupt,
    /// Unattended run: a missing artifact cannot be copied.
    pub skip_confirmation: bool,
}

impl<S> Deployment<S> {
    /// Internal helper to transition to a new state.
    fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            environment: self.environment,
            active: self.active,
            target: self.target,
            version: self.version,
            state,
        }
    }
}

// =============================================================================
// Resolved -> Protected
// =============================================================================

impl Deployment<Resolved> {
    /// Freeze the active fleet so nothing scales it in while traffic moves.
    pub async fn protect(
        self,
        fleets: &FleetController<'_>,
        guard: &ProtectionHandle,
    ) -> TransitionResult<Protected, Resolved> {
        tracing::info!(phase = %Phase::Protecting, color = %self.active, "protecting active fleet");
        match guard.protect(fleets, self.active).await {
            Ok(snapshot) => Ok(self.transition(Protected { snapshot })),
            Err(e) => Err((self, e.into())),
        }
    }
}

// =============================================================================
// Protected -> Scaled | Ready
// =============================================================================

impl Deployment<Protected> {
    /// Record the version for the target color and give its fleet `capacity`.
    pub async fn scale(
        self,
        fleets: &FleetController<'_>,
        releases: &dyn ReleaseCatalog,
        capacity: Capacity,
    ) -> TransitionResult<Scaled, Protected> {
        tracing::info!(phase = %Phase::Scaling, color = %self.target, %capacity, "scaling target fleet");
        if let Some(version) = self.version.clone() {
            let assigned = releases
                .assign_version(&self.environment, self.target, &version)
                .await
                .during("assign release");
            if let Err(e) = assigned {
                return Err((self, e));
            }
        }

        match fleets
            .set_capacity(self.target, CapacityRequest::exact(capacity))
            .await
        {
            Ok(applied) => Ok(self.transition(Scaled { capacity: applied })),
            Err(e) => Err((self, e.into())),
        }
    }

    /// Adopt a target fleet that is already running. One look at fleet and
    /// routing health, no waiting and no scaling.
    pub async fn confirm_warm(
        self,
        fleets: &FleetController<'_>,
        verifier: &HealthVerifier<'_>,
        color: &ColorConfig,
        timings: &HealthConfig,
    ) -> TransitionResult<Ready, Protected> {
        let capacity = match fleets.get_capacity(self.target).await {
            Ok(capacity) => capacity,
            Err(e) => return Err((self, e.into())),
        };
        if capacity.desired == 0 {
            let err = DeployError::config(format!(
                "{} fleet has no instances; deploy to it first",
                self.target
            ));
            return Err((self, err));
        }

        let once = PollSettings::new(Duration::ZERO, timings.poll_interval);
        let mut report = HealthReport::default();
        let fleet = match verifier
            .wait_fleet_healthy(&color.fleet, capacity.desired, once)
            .await
        {
            Ok(fleet) => fleet,
            Err(e) => return Err((self, DeployError::from_health(e, Phase::AwaitingHealth))),
        };
        let instances = fleet.serving_ids.clone();
        report.fleet = Some(fleet);
        match verifier
            .wait_routing_healthy(&color.target, &instances, once)
            .await
        {
            Ok(routing) => report.routing = Some(routing),
            Err(e) => return Err((self, DeployError::from_health(e, Phase::AwaitingHealth))),
        }

        tracing::info!(color = %self.target, %capacity, "target fleet is warm");
        Ok(self.transition(Ready { capacity, report }))
    }
}

// =============================================================================
// Scaled -> Verified
// =============================================================================

impl Deployment<Scaled> {
    /// Wait for every health signal on the target fleet.
    ///
    /// On timeout the fleet is left scaled; the caller decides what to undo.
    pub async fn await_health(
        self,
        verifier: &HealthVerifier<'_>,
        color: &ColorConfig,
        plan: ReadinessPlan<'_>,
        timings: &HealthConfig,
    ) -> TransitionResult<Verified, Scaled> {
        tracing::info!(phase = %Phase::AwaitingHealth, color = %self.target, "waiting for target fleet");
        let capacity = self.state.capacity;
        match verifier
            .wait_fully_ready(color, capacity.desired, plan, timings)
            .await
        {
            Ok(report) => Ok(self.transition(Verified { capacity, report })),
            Err(e) => Err((self, DeployError::from_health(e, Phase::AwaitingHealth))),
        }
    }
}

// =============================================================================
// Verified -> Ready
// =============================================================================

impl Deployment<Verified> {
    /// Where readiness is mandatory, make sure the version's discovery
    /// artifact exists, copying it from the source environment on request.
    pub async fn check_discovery(
        self,
        check: &DiscoveryCheck<'_>,
    ) -> TransitionResult<Ready, Verified> {
        if !check.env.readiness_required {
            let Verified { capacity, report } = self.state.clone();
            return Ok(self.transition(Ready { capacity, report }));
        }
        tracing::info!(phase = %Phase::DiscoveryCheck, "checking discovery artifact");

        match self.ensure_artifact(check).await {
            Ok(()) => {
                let Verified { capacity, report } = self.state.clone();
                Ok(self.transition(Ready { capacity, report }))
            }
            Err(e) => Err((self, e)),
        }
    }

    async fn ensure_artifact(&self, check: &DiscoveryCheck<'_>) -> Result<(), DeployError> {
        let env = &self.environment;
        let Some(version) = &self.version else {
            return Err(DeployError::discovery(format!(
                "no release is assigned to {}; cannot look for its discovery artifact",
                self.target
            )));
        };

        if check
            .discovery
            .artifact_exists(env, version)
            .await
            .during("look up discovery artifact")?
        {
            tracing::info!(%version, "discovery artifact present");
            return Ok(());
        }

        if check.skip_confirmation {
            return Err(DeployError::discovery(format!(
                "discovery artifact for {version} is missing in {env}; \
                 refusing to copy it unattended (--skip-confirmation is not accepted here)"
            )));
        }
        let Some(source) = &check.env.discovery_source else {
            return Err(DeployError::discovery(format!(
                "discovery artifact for {version} is missing in {env} and no discovery_source is configured"
            )));
        };

        let question =
            format!("Discovery artifact for {version} is missing in {env}. Copy it from {source}?");
        let answer = tokio::select! {
            answer = check.confirm.confirm(&question) => answer,
            _ = check.interrupt.triggered() => {
                return Err(DeployError::Interrupted { phase: Phase::DiscoveryCheck });
            }
        };
        match answer {
            Ok(true) => {}
            Ok(false) => {
                return Err(DeployError::discovery(
                    "operator declined to copy the discovery artifact",
                ));
            }
            Err(e) => {
                return Err(DeployError::discovery(format!(
                    "could not read confirmation: {e}"
                )));
            }
        }

        check
            .discovery
            .copy_artifact(source, env, version)
            .await
            .map_err(|e| {
                DeployError::discovery(format!(
                    "failed to copy discovery artifact for {version} from {source}: {e}"
                ))
            })?;
        tracing::info!(%version, %source, "discovery artifact copied");
        Ok(())
    }
}

// =============================================================================
// Ready -> Switched
// =============================================================================

impl Deployment<Ready> {
    /// Move traffic to the target and record it as active.
    ///
    /// Color state is written once, after routing is verified. If that write
    /// fails, routing is put back.
    pub async fn switch(self, switcher: &TrafficSwitch<'_>) -> TransitionResult<Switched, Ready> {
        tracing::info!(phase = %Phase::Switching, from = %self.active, to = %self.target, "switching traffic");
        let outcome = match switcher.switch(self.target).await {
            Ok(outcome) => outcome,
            Err(e) => return Err((self, e.into())),
        };

        if let Err(source) = switcher.commit(self.target).await {
            let err = DeployError::Cloud {
                operation: "record color state".to_string(),
                source,
            };
            return match switcher.revert(&outcome).await {
                Ok(()) => Err((self, err)),
                Err(revert) => Err((
                    self,
                    DeployError::ManualIntervention {
                        cause: Box::new(err),
                        failures: vec![format!("revert routing: {revert}")],
                    },
                )),
            };
        }

        let Ready { capacity, report } = self.state.clone();
        Ok(self.transition(Switched {
            capacity,
            report,
            switch: outcome,
        }))
    }
}

// =============================================================================
// Switched -> Completed
// =============================================================================

impl Deployment<Switched> {
    /// Give the former fleet its bounds back and apply `former`.
    ///
    /// Traffic has already moved, so failures here are warnings.
    pub async fn cleanup(
        self,
        fleets: &FleetController<'_>,
        guard: &ProtectionHandle,
        former: FormerFleet,
    ) -> Deployment<Completed> {
        tracing::info!(phase = %Phase::Cleanup, color = %self.active, %former, "releasing former fleet");
        let mut warnings = Vec::new();
        if let Err(e) = guard.restore(fleets, self.active).await {
            warnings.push(format!("restore {} fleet bounds: {e}", self.active));
        }

        let applied = match former {
            FormerFleet::Keep => fleets.get_capacity(self.active).await,
            FormerFleet::ReleaseMin => {
                fleets
                    .set_capacity(
                        self.active,
                        CapacityRequest {
                            min: Some(0),
                            ..CapacityRequest::default()
                        },
                    )
                    .await
            }
            FormerFleet::ScaleToZero => fleets.scale_to_zero(self.active).await,
        };
        let former_capacity = match applied {
            Ok(capacity) => Some(capacity),
            Err(e) => {
                warnings.push(format!("{former} on {} fleet: {e}", self.active));
                None
            }
        };

        for warning in &warnings {
            tracing::warn!(%warning, "cleanup incomplete");
        }
        let Switched {
            capacity,
            report,
            switch,
        } = self.state.clone();
        self.transition(Completed {
            capacity,
            report,
            switch,
            former: former_capacity,
            warnings,
        })
    }
}

// =============================================================================
// Completed
// =============================================================================

impl Deployment<Completed> {
    /// Finish the deployment and summarize it.
    pub fn finish(self) -> DeployReport {
        tracing::info!(phase = %Phase::Done, active = %self.target, "deployment complete");
        DeployReport {
            environment: self.environment,
            previous: self.active,
            active: self.target,
            version: self.version,
            capacity: self.state.capacity,
            former: self.state.former,
            routing: self.state.switch,
            health: self.state.report,
            warnings: self.state.warnings,
        }
    }
}
