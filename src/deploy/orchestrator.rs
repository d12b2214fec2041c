// ABOUTME: Deployment orchestrator for one environment.
// ABOUTME: Sequences fleets, health, and traffic for deploy, switch, rollback, cleanup, and shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cloud::{Capacity, Collaborators};
use crate::config::{EnvironmentConfig, HealthConfig};
use crate::fleet::{self, CapacityError, CapacityRequest, FleetController, ScopeOutcome};
use crate::health::{HealthVerifier, HttpReadinessProbe, ReadinessPlan, ReadinessProbe};
use crate::prompt::{Confirmation, FixedAnswer};
use crate::signal::Interrupt;
use crate::switch::TrafficSwitch;
use crate::types::{Color, EnvironmentName, TargetId, Version};

use super::Deployment;
use super::deployment::Abort;
use super::error::{CloudResultExt, DeployError};
use super::lease::DeployLease;
use super::report::{
    DeployOutcome, DeployPlan, DeployReport, FormerFleet, ScaleDownReport, ScaledFleet,
    SwitchReport,
};
use super::state::Phase;
use super::transitions::DiscoveryCheck;

/// Inputs to `deploy`.
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    /// Color to deploy to. Defaults to the inactive one.
    pub target: Option<Color>,
    /// Desired instance count. Defaults to the active fleet's.
    pub capacity: Option<u32>,
    /// Release to deploy. Defaults to what the target color already runs.
    pub version: Option<Version>,
    pub skip_confirmation: bool,
    pub skip_readiness_check: bool,
    pub readiness_timeout: Option<Duration>,
    pub dry_run: bool,
    pub scale_down_previous: bool,
    pub force_unlock: bool,
}

/// Flags shared by the commands other than `deploy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandOptions {
    pub skip_confirmation: bool,
    pub dry_run: bool,
    pub force_unlock: bool,
}

/// The color state as recorded, checked against configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveColor {
    pub color: Color,
    pub target: TargetId,
}

/// Runs commands against one environment.
pub struct Orchestrator {
    pub(crate) name: EnvironmentName,
    pub(crate) env: EnvironmentConfig,
    pub(crate) timings: HealthConfig,
    pub(crate) cloud: Collaborators,
    pub(crate) probe: Arc<dyn ReadinessProbe>,
    pub(crate) confirm: Arc<dyn Confirmation>,
    pub(crate) interrupt: Interrupt,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("environment", &self.name)
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Unattended by default: every confirmation is declined and no interrupt arrives.
    pub fn new(
        name: EnvironmentName,
        env: EnvironmentConfig,
        timings: HealthConfig,
        cloud: Collaborators,
    ) -> Self {
        Self {
            name,
            env,
            timings,
            cloud,
            probe: Arc::new(HttpReadinessProbe::default()),
            confirm: Arc::new(FixedAnswer(false)),
            interrupt: Interrupt::never(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_confirmation(mut self, confirm: Arc<dyn Confirmation>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn environment(&self) -> &EnvironmentName {
        &self.name
    }

    pub(crate) fn fleets(&self) -> FleetController<'_> {
        FleetController::new(self.cloud.scaling.as_ref(), &self.env)
    }

    pub(crate) fn switcher(&self) -> TrafficSwitch<'_> {
        TrafficSwitch::new(
            &self.name,
            &self.env,
            self.cloud.balancer.as_ref(),
            self.cloud.state.as_ref(),
        )
    }

    pub(crate) fn verifier(&self) -> HealthVerifier<'_> {
        HealthVerifier::new(
            self.cloud.scaling.as_ref(),
            self.cloud.balancer.as_ref(),
            self.probe.as_ref(),
            self.interrupt.clone(),
        )
    }

    /// Read color state and check it against configuration.
    pub async fn resolve(&self) -> Result<ActiveColor, DeployError> {
        let record = self
            .cloud
            .state
            .load(&self.name)
            .await
            .during("read color state")?
            .ok_or_else(|| {
                DeployError::config(format!("no color state recorded for {}", self.name))
            })?;

        let color: Color = record
            .active_color
            .as_deref()
            .ok_or_else(|| {
                DeployError::config(format!("color state for {} has no active color", self.name))
            })?
            .parse()
            .map_err(|e| DeployError::config(format!("color state for {}: {e}", self.name)))?;
        let target = record.active_target.map(TargetId::new).ok_or_else(|| {
            DeployError::config(format!(
                "color state for {} has no active routing target",
                self.name
            ))
        })?;

        let expected = &self.env.color(color).target;
        if &target != expected {
            let detail = match self.env.color_of_target(&target) {
                Some(other) => format!("which belongs to {other}"),
                None => "which is not configured for either color".to_string(),
            };
            return Err(DeployError::config(format!(
                "color state for {} marks {color} active but records target {target}, {detail}",
                self.name
            )));
        }
        tracing::debug!(environment = %self.name, %color, %target, "color state resolved");
        Ok(ActiveColor { color, target })
    }

    // =========================================================================
    // deploy
    // =========================================================================

    /// Scale the inactive color to a new version, verify it, and move traffic to it.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<DeployOutcome, DeployError> {
        let plan = self.plan_deploy(request).await?;
        if request.dry_run {
            return Ok(DeployOutcome::Planned(plan));
        }

        let version = plan
            .version
            .as_ref()
            .map_or_else(|| "the current version".to_string(), ToString::to_string);
        self.confirm_or_cancel(
            request.skip_confirmation,
            &format!(
                "Deploy {version} to {} in {} and switch traffic to it?",
                plan.target, self.name
            ),
        )
        .await?;

        let report = self
            .with_lease("deploy", request.force_unlock, || async {
                self.recheck(plan.active).await?;
                self.run_deploy(&plan, request).await
            })
            .await?;
        Ok(DeployOutcome::Completed(report))
    }

    /// Decide colors, capacity and version without changing anything.
    async fn plan_deploy(&self, request: &DeployRequest) -> Result<DeployPlan, DeployError> {
        let active = self.resolve().await?;
        let target = request.target.unwrap_or(active.color.other());
        if target == active.color {
            return Err(DeployError::config(format!(
                "{target} is the active color in {}; deploy to the inactive color",
                self.name
            )));
        }

        let fleets = self.fleets();
        let active_capacity = fleets.get_capacity(active.color).await?;
        let target_capacity = fleets.get_capacity(target).await?;
        let desired = request.capacity.unwrap_or(active_capacity.desired);
        if desired == 0 {
            return Err(CapacityError::Empty { color: target }.into());
        }
        let ceiling = self.env.capacity_ceiling;
        let capacity = if self.env.autoscaling {
            Capacity::new(desired, desired, ceiling)
        } else {
            Capacity::new(desired, desired, desired)
        };
        CapacityRequest::exact(capacity).resolve(target_capacity, ceiling)?;

        let releases = self.cloud.releases.as_ref();
        let assigned = releases
            .assigned_version(&self.name, target)
            .await
            .during("read release assignment")?;
        let version = match &request.version {
            Some(version) => {
                let known = releases
                    .list_releases(None)
                    .await
                    .during("list releases")?
                    .iter()
                    .any(|r| &r.version == version);
                if !known {
                    return Err(DeployError::config(format!(
                        "release {version} is not in the release catalog"
                    )));
                }
                if let Some(running) = &assigned
                    && running != version
                    && target_capacity.desired > 0
                {
                    return Err(DeployError::config(format!(
                        "{target} fleet still runs {running} on {} instance(s); run cleanup first",
                        target_capacity.desired
                    )));
                }
                Some(version.clone())
            }
            None => match assigned {
                Some(version) => Some(version),
                None => releases
                    .assigned_version(&self.name, active.color)
                    .await
                    .during("read release assignment")?,
            },
        };

        Ok(DeployPlan {
            environment: self.name.clone(),
            active: active.color,
            target,
            version,
            capacity,
            former: if request.scale_down_previous {
                FormerFleet::ScaleToZero
            } else {
                FormerFleet::ReleaseMin
            },
            discovery_required: self.env.readiness_required,
            readiness_probe: self.env.readiness.is_some() && !request.skip_readiness_check,
        })
    }

    async fn run_deploy(
        &self,
        plan: &DeployPlan,
        request: &DeployRequest,
    ) -> Result<DeployReport, DeployError> {
        let fleets = &self.fleets();
        let verifier = &self.verifier();
        let switcher = &self.switcher();
        let color = self.env.color(plan.target);
        let readiness = ReadinessPlan {
            readiness: self.env.readiness.as_ref(),
            skip_readiness: request.skip_readiness_check,
            readiness_timeout: request.readiness_timeout,
        };
        let discovery = DiscoveryCheck {
            env: &self.env,
            discovery: self.cloud.discovery.as_ref(),
            confirm: self.confirm.as_ref(),
            interrupt: &self.interrupt,
            skip_confirmation: request.skip_confirmation,
        };
        let discovery = &discovery;
        let interrupt = &self.interrupt;

        let outcome = fleet::protected(fleets, self.timings.cleanup_timeout, |guard| async move {
            let deployment = Deployment::new(
                self.name.clone(),
                plan.active,
                plan.target,
                plan.version.clone(),
            );
            let deployment = deployment
                .checkpoint(interrupt)?
                .protect(fleets, &guard)
                .await?;
            let deployment = deployment
                .checkpoint(interrupt)?
                .scale(fleets, self.cloud.releases.as_ref(), plan.capacity)
                .await?;
            let deployment = deployment
                .checkpoint(interrupt)?
                .await_health(verifier, color, readiness, &self.timings)
                .await?;
            let deployment = deployment
                .checkpoint(interrupt)?
                .check_discovery(discovery)
                .await?;
            let deployment = deployment.checkpoint(interrupt)?.switch(switcher).await?;
            let deployment = deployment.cleanup(fleets, &guard, plan.former).await;
            Ok::<_, Abort>(deployment.finish())
        })
        .await;

        self.settle(outcome, Some(plan.target)).await
    }

    // =========================================================================
    // switch / rollback
    // =========================================================================

    /// Move traffic to `color`, which must already be running.
    pub async fn switch(
        &self,
        color: Color,
        options: CommandOptions,
    ) -> Result<SwitchReport, DeployError> {
        self.switch_to(Some(color), options, "switch").await
    }

    /// Move traffic back to the other color. No scale-up is done: the other
    /// fleet must still be warm.
    pub async fn rollback(&self, options: CommandOptions) -> Result<SwitchReport, DeployError> {
        self.switch_to(None, options, "rollback").await
    }

    async fn switch_to(
        &self,
        color: Option<Color>,
        options: CommandOptions,
        command: &str,
    ) -> Result<SwitchReport, DeployError> {
        let active = self.resolve().await?;
        let target = color.unwrap_or(active.color.other());
        let mut report = SwitchReport {
            environment: self.name.clone(),
            from: active.color,
            to: target,
            changed: target != active.color,
            dry_run: options.dry_run,
            warnings: Vec::new(),
        };
        if !report.changed {
            tracing::info!(%target, "already active, nothing to switch");
            return Ok(report);
        }

        let warm = self.fleets().get_capacity(target).await?;
        if warm.desired == 0 {
            return Err(DeployError::config(format!(
                "no warm fleet to {command} to: {target} has desired capacity 0"
            )));
        }
        if options.dry_run {
            return Ok(report);
        }

        self.confirm_or_cancel(
            options.skip_confirmation,
            &format!(
                "Switch {} traffic from {} to {target}?",
                self.name, active.color
            ),
        )
        .await?;

        let done = self
            .with_lease(command, options.force_unlock, || async {
                self.recheck(active.color).await?;
                self.run_switch(active.color, target).await
            })
            .await?;
        report.warnings = done.warnings;
        Ok(report)
    }

    async fn run_switch(&self, from: Color, to: Color) -> Result<DeployReport, DeployError> {
        let fleets = &self.fleets();
        let verifier = &self.verifier();
        let switcher = &self.switcher();
        let color = self.env.color(to);
        let interrupt = &self.interrupt;
        let version = self
            .cloud
            .releases
            .assigned_version(&self.name, to)
            .await
            .during("read release assignment")?;

        let outcome = fleet::protected(fleets, self.timings.cleanup_timeout, |guard| async move {
            let deployment = Deployment::new(self.name.clone(), from, to, version);
            let deployment = deployment
                .checkpoint(interrupt)?
                .protect(fleets, &guard)
                .await?;
            let deployment = deployment
                .checkpoint(interrupt)?
                .confirm_warm(fleets, verifier, color, &self.timings)
                .await?;
            let deployment = deployment.checkpoint(interrupt)?.switch(switcher).await?;
            let deployment = deployment.cleanup(fleets, &guard, FormerFleet::Keep).await;
            Ok::<_, Abort>(deployment.finish())
        })
        .await;

        self.settle(outcome, None).await
    }

    // =========================================================================
    // cleanup / shutdown
    // =========================================================================

    /// Scale an inactive color to zero. Refuses the active color.
    pub async fn cleanup(
        &self,
        color: Option<Color>,
        options: CommandOptions,
    ) -> Result<ScaleDownReport, DeployError> {
        let active = self.resolve().await?;
        let color = color.unwrap_or(active.color.other());
        if color == active.color {
            return Err(DeployError::config(format!(
                "refusing to scale down {color}: it is the active color in {}",
                self.name
            )));
        }

        let fleets = self.fleets();
        let before = fleets.get_capacity(color).await?;
        if options.dry_run {
            return Ok(ScaleDownReport {
                environment: self.name.clone(),
                fleets: vec![ScaledFleet {
                    color,
                    before,
                    after: Capacity::new(0, 0, before.max),
                }],
                dry_run: true,
            });
        }

        self.confirm_or_cancel(
            options.skip_confirmation,
            &format!("Scale the inactive {color} fleet of {} to zero?", self.name),
        )
        .await?;
        let after = self
            .with_lease("cleanup", options.force_unlock, || async {
                self.recheck(active.color).await?;
                Ok::<_, DeployError>(fleets.scale_to_zero(color).await?)
            })
            .await?;

        Ok(ScaleDownReport {
            environment: self.name.clone(),
            fleets: vec![ScaledFleet {
                color,
                before,
                after,
            }],
            dry_run: false,
        })
    }

    /// Scale both colors to zero. Color state is left as is.
    pub async fn shutdown(&self, options: CommandOptions) -> Result<ScaleDownReport, DeployError> {
        if self.env.readiness_required && options.skip_confirmation {
            return Err(DeployError::config(format!(
                "refusing to shut down {} unattended; --skip-confirmation is not accepted for this environment",
                self.name
            )));
        }

        // Inactive first, so the live color is the last to go.
        let active = match self.resolve().await {
            Ok(active) => Some(active.color),
            Err(e) => {
                tracing::warn!(error = %e, "color state unusable, shutting down in fixed order");
                None
            }
        };
        let order = match active {
            Some(color) => [color.other(), color],
            None => Color::ALL,
        };
        let fleets = self.fleets();
        let mut planned = Vec::with_capacity(order.len());
        for color in order {
            let before = fleets.get_capacity(color).await?;
            planned.push(ScaledFleet {
                color,
                before,
                after: Capacity::new(0, 0, before.max),
            });
        }
        if options.dry_run {
            return Ok(ScaleDownReport {
                environment: self.name.clone(),
                fleets: planned,
                dry_run: true,
            });
        }

        self.confirm_or_cancel(
            options.skip_confirmation,
            &format!(
                "Scale BOTH colors of {} to zero? The service goes offline.",
                self.name
            ),
        )
        .await?;
        let scaled = self
            .with_lease("shutdown", options.force_unlock, || async {
                if let Some(color) = active {
                    self.recheck(color).await?;
                }
                let mut scaled = Vec::with_capacity(planned.len());
                for mut entry in planned {
                    entry.after = fleets.scale_to_zero(entry.color).await?;
                    scaled.push(entry);
                }
                Ok::<_, DeployError>(scaled)
            })
            .await?;

        Ok(ScaleDownReport {
            environment: self.name.clone(),
            fleets: scaled,
            dry_run: false,
        })
    }

    // =========================================================================
    // helpers
    // =========================================================================

    async fn confirm_or_cancel(&self, skip: bool, question: &str) -> Result<(), DeployError> {
        if skip {
            return Ok(());
        }
        let answer = tokio::select! {
            answer = self.confirm.confirm(question) => answer,
            _ = self.interrupt.triggered() => {
                return Err(DeployError::Interrupted { phase: Phase::Idle });
            }
        };
        match answer {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeployError::Cancelled),
            Err(e) => Err(DeployError::config(format!(
                "could not read confirmation: {e}"
            ))),
        }
    }

    /// Re-read color state under the lease. Fails if another run moved the
    /// active color since this command planned against `planned`.
    async fn recheck(&self, planned: Color) -> Result<(), DeployError> {
        let active = self.resolve().await?;
        if active.color != planned {
            return Err(DeployError::config(format!(
                "active color in {} changed from {planned} to {} while waiting; re-run the command",
                self.name, active.color
            )));
        }
        Ok(())
    }

    /// Hold the deploy lease while `body` runs.
    async fn with_lease<T, F, Fut>(
        &self,
        command: &str,
        force: bool,
        body: F,
    ) -> Result<T, DeployError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DeployError>>,
    {
        let lease =
            DeployLease::acquire(self.cloud.state.as_ref(), &self.name, command, force).await?;
        let result = body().await;
        if let Err(e) = lease.release().await {
            tracing::warn!(error = %e, "failed to release deploy lease");
        }
        result
    }

    /// Turn the outcome of a protected run into the command's result.
    ///
    /// `uncommitted` names the fleet this run scaled up; after an interrupt
    /// its min is dropped to zero so it can drain, desired is left alone.
    async fn settle(
        &self,
        outcome: ScopeOutcome<DeployReport, Abort>,
        uncommitted: Option<Color>,
    ) -> Result<DeployReport, DeployError> {
        let ScopeOutcome {
            result,
            restore_failures,
        } = outcome;

        let abort = match result {
            Ok(mut report) => {
                report.warnings.extend(restore_failures);
                return Ok(report);
            }
            Err(abort) => abort,
        };
        tracing::warn!(phase = %abort.phase, error = %abort.error, next = %Phase::Aborting, "aborting");

        let (cause, mut failures) = match abort.error {
            DeployError::ManualIntervention { cause, failures } => (*cause, failures),
            other => (other, Vec::new()),
        };
        failures.extend(restore_failures);

        if let DeployError::Switch(e) = &cause
            && e.is_stranded()
        {
            failures.push(format!("routing may be split between colors: {e}"));
        }

        if let Some(color) = uncommitted
            && matches!(cause, DeployError::Interrupted { .. })
            && abort.phase.leaves_uncommitted_fleet()
        {
            let reset = CapacityRequest {
                min: Some(0),
                ..CapacityRequest::default()
            };
            let fleets = self.fleets();
            match tokio::time::timeout(
                self.timings.cleanup_timeout,
                fleets.set_capacity(color, reset),
            )
            .await
            {
                Ok(Ok(capacity)) => tracing::info!(%color, %capacity, "min reset on interrupted fleet"),
                Ok(Err(e)) => failures.push(format!("reset {color} fleet min: {e}")),
                Err(_) => failures.push(format!("reset {color} fleet min: timed out")),
            }
        }

        if failures.is_empty() {
            tracing::info!(phase = %Phase::RolledBack, "unwound cleanly");
            Err(cause)
        } else {
            for failure in &failures {
                tracing::error!(%failure, "cleanup step failed");
            }
            Err(DeployError::ManualIntervention {
                cause: Box::new(cause),
                failures,
            })
        }
    }
}
