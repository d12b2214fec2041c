// ABOUTME: Polling engine that decides whether a freshly scaled fleet can take traffic.
// ABOUTME: Combines fleet health, routing-target health, and an optional readiness probe.

mod probe;
mod report;

pub use probe::{HttpReadinessProbe, ProbeError, ReadinessProbe};
pub use report::{
    FleetHealth, HealthReport, HealthTimeout, ReadinessHealth, RoutingHealth, Signal,
};

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::cloud::{CloudError, LoadBalancerApi, ScalingApi, TargetState};
use crate::config::{ColorConfig, HealthConfig, ReadinessConfig};
use crate::signal::Interrupt;
use crate::types::{FleetId, InstanceId, TargetId};

/// Deadline and cadence for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollSettings {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("{0}")]
    Timeout(Box<HealthTimeout>),

    #[error("interrupted while waiting for {signal} health")]
    Interrupted { signal: Signal },

    #[error("{signal} health check failed: {source}")]
    Cloud {
        signal: Signal,
        #[source]
        source: CloudError,
    },
}

/// What the caller wants verified beyond plain fleet health.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPlan<'c> {
    pub readiness: Option<&'c ReadinessConfig>,
    pub skip_readiness: bool,
    pub readiness_timeout: Option<Duration>,
}

/// A wait that ended without its condition holding.
enum PollFailure<T> {
    Timeout { waited: Duration, last: Option<T> },
    Interrupted,
    Cloud(CloudError),
}

pub struct HealthVerifier<'a> {
    scaling: &'a dyn ScalingApi,
    balancer: &'a dyn LoadBalancerApi,
    probe: &'a dyn ReadinessProbe,
    interrupt: Interrupt,
}

impl<'a> HealthVerifier<'a> {
    pub fn new(
        scaling: &'a dyn ScalingApi,
        balancer: &'a dyn LoadBalancerApi,
        probe: &'a dyn ReadinessProbe,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            scaling,
            balancer,
            probe,
            interrupt,
        }
    }

    /// Wait until exactly `desired` instances of `fleet` are in service and healthy.
    pub async fn wait_fleet_healthy(
        &self,
        fleet: &FleetId,
        desired: u32,
        settings: PollSettings,
    ) -> Result<FleetHealth, HealthError> {
        let scaling = self.scaling;
        let outcome = self
            .poll(settings, FleetHealth::is_met, move || async move {
                let description = scaling.describe_fleet(fleet).await?;
                let serving: Vec<InstanceId> = description
                    .instances
                    .iter()
                    .filter(|i| i.is_serving())
                    .map(|i| i.id.clone())
                    .collect();
                Ok::<_, CloudError>(FleetHealth {
                    fleet: fleet.clone(),
                    expected: desired,
                    serving: serving.len() as u32,
                    total: description.instances.len() as u32,
                    serving_ids: serving,
                })
            })
            .await;
        outcome.map_err(|failure| {
            Self::failure(Signal::Fleet, failure, |last, report| report.fleet = last)
        })
    }

    /// Wait until every instance in `instances` reports healthy on `target`.
    pub async fn wait_routing_healthy(
        &self,
        target: &TargetId,
        instances: &[InstanceId],
        settings: PollSettings,
    ) -> Result<RoutingHealth, HealthError> {
        let balancer = self.balancer;
        let outcome = self
            .poll(settings, RoutingHealth::is_met, move || async move {
                let members = balancer.target_health(target).await?;
                let mut failures = BTreeMap::new();
                let mut healthy = 0;
                for id in instances {
                    match members.iter().find(|m| &m.instance == id) {
                        Some(m) if m.state == TargetState::Healthy => healthy += 1,
                        Some(m) => {
                            let reason = m.reason.clone().unwrap_or_else(|| m.state.to_string());
                            failures.insert(id.clone(), reason);
                        }
                        None => {
                            failures.insert(id.clone(), "not registered".to_string());
                        }
                    }
                }
                Ok::<_, CloudError>(RoutingHealth {
                    target: target.clone(),
                    expected: instances.len(),
                    healthy,
                    failures,
                })
            })
            .await;
        outcome.map_err(|failure| {
            Self::failure(Signal::Routing, failure, |last, report| report.routing = last)
        })
    }

    /// Wait until the probe at `url` lists at least `min_count` entries.
    /// Probe errors count as "not ready yet" and are kept for the report.
    pub async fn wait_readiness(
        &self,
        url: &str,
        min_count: usize,
        settings: PollSettings,
    ) -> Result<ReadinessHealth, HealthError> {
        let probe = self.probe;
        let outcome = self
            .poll(settings, ReadinessHealth::is_met, move || async move {
                let observation = match probe.count(url).await {
                    Ok(count) => ReadinessHealth {
                        url: url.to_string(),
                        expected: min_count,
                        observed: Some(count),
                        last_error: None,
                    },
                    Err(e) => {
                        tracing::debug!(url, error = %e, "readiness probe not answering yet");
                        ReadinessHealth {
                            url: url.to_string(),
                            expected: min_count,
                            observed: None,
                            last_error: Some(e.to_string()),
                        }
                    }
                };
                Ok::<_, CloudError>(observation)
            })
            .await;
        outcome.map_err(|failure| {
            Self::failure(Signal::Readiness, failure, |last, report| {
                report.readiness = last
            })
        })
    }

    /// Fleet health, then routing health of the serving instances, then the
    /// readiness probe when one is configured and not skipped. Stops at the
    /// first signal that fails; its timeout carries everything observed so far.
    pub async fn wait_fully_ready(
        &self,
        color: &ColorConfig,
        desired: u32,
        plan: ReadinessPlan<'_>,
        timings: &HealthConfig,
    ) -> Result<HealthReport, HealthError> {
        let mut report = HealthReport::default();

        let fleet = self
            .wait_fleet_healthy(
                &color.fleet,
                desired,
                PollSettings::new(timings.fleet_timeout, timings.poll_interval),
            )
            .await?;
        tracing::info!(fleet = %color.fleet, serving = fleet.serving, "fleet healthy");
        let instances = fleet.serving_ids.clone();
        report.fleet = Some(fleet);

        let routing = self
            .wait_routing_healthy(
                &color.target,
                &instances,
                PollSettings::new(timings.routing_timeout, timings.poll_interval),
            )
            .await
            .map_err(|e| with_earlier(e, &report))?;
        tracing::info!(target = %color.target, healthy = routing.healthy, "routing target healthy");
        report.routing = Some(routing);

        match plan.readiness {
            Some(readiness) if !plan.skip_readiness => {
                let timeout = plan.readiness_timeout.unwrap_or(timings.readiness_timeout);
                let observed = self
                    .wait_readiness(
                        &readiness.url,
                        readiness.min_count,
                        PollSettings::new(timeout, timings.poll_interval),
                    )
                    .await
                    .map_err(|e| with_earlier(e, &report))?;
                tracing::info!(url = %readiness.url, observed = ?observed.observed, "readiness confirmed");
                report.readiness = Some(observed);
            }
            Some(_) => tracing::warn!("readiness check skipped"),
            None => {}
        }

        Ok(report)
    }

    /// Re-run `check` until `is_met` holds, the deadline passes, or the
    /// interrupt fires. The interrupt is only observed around sleeps.
    async fn poll<T, C, F>(
        &self,
        settings: PollSettings,
        is_met: fn(&T) -> bool,
        mut check: C,
    ) -> Result<T, PollFailure<T>>
    where
        C: FnMut() -> F,
        F: Future<Output = Result<T, CloudError>>,
    {
        let started = Instant::now();
        let deadline = started + settings.timeout;
        loop {
            if self.interrupt.is_triggered() {
                return Err(PollFailure::Interrupted);
            }
            let observation = check().await.map_err(PollFailure::Cloud)?;
            if is_met(&observation) {
                return Ok(observation);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PollFailure::Timeout {
                    waited: now - started,
                    last: Some(observation),
                });
            }
            let nap = settings.interval.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(nap) => {}
                _ = self.interrupt.triggered() => return Err(PollFailure::Interrupted),
            }
        }
    }

    fn failure<T>(
        signal: Signal,
        failure: PollFailure<T>,
        place: impl FnOnce(Option<T>, &mut HealthReport),
    ) -> HealthError {
        match failure {
            PollFailure::Timeout { waited, last } => {
                let mut report = HealthReport::default();
                place(last, &mut report);
                HealthError::Timeout(Box::new(HealthTimeout {
                    signal,
                    waited,
                    report,
                }))
            }
            PollFailure::Interrupted => HealthError::Interrupted { signal },
            PollFailure::Cloud(source) => HealthError::Cloud { signal, source },
        }
    }
}

fn with_earlier(err: HealthError, earlier: &HealthReport) -> HealthError {
    match err {
        HealthError::Timeout(mut timeout) => {
            timeout.report.merge(earlier);
            HealthError::Timeout(timeout)
        }
        other => other,
    }
}
