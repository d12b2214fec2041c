// ABOUTME: Read-only orchestrator commands: status, validate, and release listing.
// ABOUTME: Never mutates fleets, routing, or color state.

use std::collections::BTreeMap;

use crate::cloud::TargetState;
use crate::types::{Color, Version};

use super::error::{CloudResultExt, DeployError};
use super::orchestrator::Orchestrator;
use super::report::{
    ColorStatus, ReadinessStatus, ReleaseEntry, ReleaseListing, StatusReport, ValidationReport,
};

impl Orchestrator {
    /// Active color, per-color capacity and health counts. Problems are
    /// reported in the result rather than failing the command.
    pub async fn status(&self) -> Result<StatusReport, DeployError> {
        let (active, state_error) = match self.resolve().await {
            Ok(active) => (Some(active.color), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let (live_target, routing_error) = match self.switcher().live_target().await {
            Ok(target) => (Some(target), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let mut colors = Vec::with_capacity(Color::ALL.len());
        for color in Color::ALL {
            let config = self.env.color(color);
            let version = self
                .cloud
                .releases
                .assigned_version(&self.name, color)
                .await
                .during("read release assignment")?;
            let mut status = ColorStatus {
                color,
                fleet: config.fleet.clone(),
                target: config.target.clone(),
                active: active == Some(color),
                routed: live_target.as_ref() == Some(&config.target),
                version,
                capacity: None,
                serving: 0,
                instances: 0,
                routing_healthy: 0,
                routing_registered: 0,
                error: None,
            };
            let (fleet, routing) = futures::join!(
                self.cloud.scaling.describe_fleet(&config.fleet),
                self.cloud.balancer.target_health(&config.target),
            );
            match fleet {
                Ok(description) => {
                    status.capacity = Some(description.capacity);
                    status.instances = description.instances.len();
                    status.serving = description.instances.iter().filter(|i| i.is_serving()).count();
                }
                Err(e) => status.error = Some(e.to_string()),
            }
            match routing {
                Ok(members) => {
                    status.routing_registered = members.len();
                    status.routing_healthy = members
                        .iter()
                        .filter(|m| m.state == TargetState::Healthy)
                        .count();
                }
                Err(e) => {
                    status.error.get_or_insert_with(|| e.to_string());
                }
            }
            colors.push(status);
        }

        let readiness = match &self.env.readiness {
            Some(readiness) => {
                let (observed, error) = match self.probe.count(&readiness.url).await {
                    Ok(count) => (Some(count), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                Some(ReadinessStatus {
                    url: readiness.url.clone(),
                    expected: readiness.min_count,
                    observed,
                    error,
                })
            }
            None => None,
        };

        Ok(StatusReport {
            environment: self.name.clone(),
            active,
            state_error,
            live_target,
            routing_error,
            colors,
            readiness,
        })
    }

    /// Check color-state invariants against configuration and the load balancer.
    pub async fn validate(&self) -> Result<ValidationReport, DeployError> {
        let mut report = ValidationReport::new(self.name.clone());

        report.check(
            "config",
            self.env
                .validate()
                .map(|()| "fleets and targets are distinct per color".to_string()),
        );

        let active = self.resolve().await;
        report.check(
            "color-state",
            match &active {
                Ok(active) => Ok(format!("{} active via {}", active.color, active.target)),
                Err(e) => Err(e.to_string()),
            },
        );

        let live = self.switcher().live_target().await;
        report.check(
            "routing",
            match &live {
                Ok(target) => Ok(format!("all routes forward to {target}")),
                Err(e) => Err(e.to_string()),
            },
        );

        if let (Ok(active), Ok(live)) = (&active, &live) {
            let outcome = if &active.target == live {
                Ok(format!("traffic reaches {}", active.color))
            } else {
                let routed = self
                    .env
                    .color_of_target(live)
                    .map_or_else(|| "an unknown target".to_string(), |c| c.to_string());
                Err(format!(
                    "state says {} is active but traffic goes to {live} ({routed})",
                    active.color
                ))
            };
            report.check("state-matches-routing", outcome);
        }

        for color in Color::ALL {
            let config = self.env.color(color);
            let fleet = match self.cloud.scaling.describe_fleet(&config.fleet).await {
                Ok(description) if description.capacity.max > self.env.capacity_ceiling => {
                    Err(format!(
                        "{} max {} exceeds the ceiling of {}",
                        config.fleet, description.capacity.max, self.env.capacity_ceiling
                    ))
                }
                Ok(description) => Ok(format!("{} at {}", config.fleet, description.capacity)),
                Err(e) => Err(e.to_string()),
            };
            report.check(&format!("{color}-fleet"), fleet);

            let target = match self.cloud.balancer.target_exists(&config.target).await {
                Ok(true) => Ok(format!("{} exists", config.target)),
                Ok(false) => Err(format!("{} does not exist", config.target)),
                Err(e) => Err(e.to_string()),
            };
            report.check(&format!("{color}-target"), target);
        }

        if let Ok(active) = &active {
            let config = self.env.color(active.color);
            let serving = match self.cloud.scaling.describe_fleet(&config.fleet).await {
                Ok(description) => {
                    let serving = description.instances.iter().filter(|i| i.is_serving()).count();
                    if serving == 0 {
                        Err(format!("{} has no serving instances", config.fleet))
                    } else {
                        Ok(format!(
                            "{serving}/{} instances serving",
                            description.capacity.desired
                        ))
                    }
                }
                Err(e) => Err(e.to_string()),
            };
            report.check("active-fleet-serving", serving);
        }

        Ok(report)
    }

    /// Releases newest first, marking which colors run each one.
    pub async fn list_releases(&self, branch: Option<&str>) -> Result<ReleaseListing, DeployError> {
        let releases = self
            .cloud
            .releases
            .list_releases(branch)
            .await
            .during("list releases")?;

        let mut assigned: BTreeMap<Version, Vec<Color>> = BTreeMap::new();
        for color in Color::ALL {
            if let Some(version) = self
                .cloud
                .releases
                .assigned_version(&self.name, color)
                .await
                .during("read release assignment")?
            {
                assigned.entry(version).or_default().push(color);
            }
        }

        let releases = releases
            .into_iter()
            .map(|release| ReleaseEntry {
                colors: assigned.get(&release.version).cloned().unwrap_or_default(),
                version: release.version,
                branch: release.branch,
                created_at: release.created_at,
            })
            .collect();
        Ok(ReleaseListing {
            environment: self.name.clone(),
            releases,
        })
    }
}
