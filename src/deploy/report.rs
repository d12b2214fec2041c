// ABOUTME: Results of orchestrator commands, printable as text or JSON.
// ABOUTME: Covers deploy plans and outcomes, switches, cleanup, status, validation, and releases.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::cloud::Capacity;
use crate::health::HealthReport;
use crate::switch::SwitchOutcome;
use crate::types::{Color, EnvironmentName, FleetId, TargetId, Version};

/// What happens to the formerly active fleet once traffic has moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormerFleet {
    /// Put its bounds back exactly.
    Keep,
    /// Restore, then drop min to zero so it can shrink but stays warm.
    ReleaseMin,
    /// Restore, then scale it to zero.
    ScaleToZero,
}

impl fmt::Display for FormerFleet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormerFleet::Keep => "keep as is",
            FormerFleet::ReleaseMin => "keep warm, min reset to 0",
            FormerFleet::ScaleToZero => "scale to zero",
        };
        f.write_str(s)
    }
}

/// What a deploy would do.
#[derive(Debug, Clone, Serialize)]
pub struct DeployPlan {
    pub environment: EnvironmentName,
    pub active: Color,
    pub target: Color,
    pub version: Option<Version>,
    pub capacity: Capacity,
    pub former: FormerFleet,
    pub discovery_required: bool,
    pub readiness_probe: bool,
}

impl fmt::Display for DeployPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self
            .version
            .as_ref()
            .map_or_else(|| "current version".to_string(), ToString::to_string);
        writeln!(
            f,
            "Plan for {}: deploy {version} to {} ({} active)",
            self.environment, self.target, self.active
        )?;
        let mut steps = vec![
            format!("freeze {} fleet at its current size", self.active),
            format!("scale {} fleet to {}", self.target, self.capacity),
        ];
        if self.readiness_probe {
            steps.push("wait for fleet, routing and readiness health".to_string());
        } else {
            steps.push("wait for fleet and routing health".to_string());
        }
        if self.discovery_required {
            steps.push("require a discovery artifact for the version".to_string());
        }
        steps.push(format!("switch traffic to {}", self.target));
        steps.push(format!("former {} fleet: {}", self.active, self.former));
        let lines: Vec<String> = steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("  {}. {step}", i + 1))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

/// A completed deploy.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub environment: EnvironmentName,
    pub previous: Color,
    pub active: Color,
    pub version: Option<Version>,
    pub capacity: Capacity,
    /// Capacity left on the formerly active fleet.
    pub former: Option<Capacity>,
    /// Routing targets before and after the switch.
    pub routing: SwitchOutcome,
    pub health: HealthReport,
    pub warnings: Vec<String>,
}

impl fmt::Display for DeployReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self
            .version
            .as_ref()
            .map_or_else(|| "current version".to_string(), ToString::to_string);
        write!(
            f,
            "{} now live on {} with {version} ({})",
            self.environment, self.active, self.capacity
        )?;
        if self.routing.changed() {
            write!(
                f,
                "\nrouting moved from {} to {}",
                self.routing.previous, self.routing.current
            )?;
        }
        if let Some(former) = self.former {
            write!(f, "\n{} fleet left at {former}", self.previous)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum DeployOutcome {
    Planned(DeployPlan),
    Completed(DeployReport),
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployOutcome::Planned(plan) => plan.fmt(f),
            DeployOutcome::Completed(report) => report.fmt(f),
        }
    }
}

/// Result of `switch` or `rollback`.
#[derive(Debug, Clone, Serialize)]
pub struct SwitchReport {
    pub environment: EnvironmentName,
    pub from: Color,
    pub to: Color,
    pub changed: bool,
    pub dry_run: bool,
    pub warnings: Vec<String>,
}

impl fmt::Display for SwitchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.changed, self.dry_run) {
            (false, _) => write!(f, "{} already live on {}", self.environment, self.to),
            (true, true) => write!(
                f,
                "Would switch {} from {} to {}",
                self.environment, self.from, self.to
            ),
            (true, false) => write!(
                f,
                "{} switched from {} to {}",
                self.environment, self.from, self.to
            ),
        }
    }
}

/// Result of scaling one or both colors down.
#[derive(Debug, Clone, Serialize)]
pub struct ScaleDownReport {
    pub environment: EnvironmentName,
    pub fleets: Vec<ScaledFleet>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaledFleet {
    pub color: Color,
    pub before: Capacity,
    pub after: Capacity,
}

impl fmt::Display for ScaleDownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "would scale" } else { "scaled" };
        let lines: Vec<String> = self
            .fleets
            .iter()
            .map(|s| {
                format!(
                    "{}: {verb} {} fleet from {} to {}",
                    self.environment, s.color, s.before, s.after
                )
            })
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

/// Read-only view of one environment.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub environment: EnvironmentName,
    pub active: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_error: Option<String>,
    pub live_target: Option<TargetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_error: Option<String>,
    pub colors: Vec<ColorStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ReadinessStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorStatus {
    pub color: Color,
    pub fleet: FleetId,
    pub target: TargetId,
    pub active: bool,
    /// The load balancer forwards to this color's target.
    pub routed: bool,
    pub version: Option<Version>,
    pub capacity: Option<Capacity>,
    pub serving: usize,
    pub instances: usize,
    pub routing_healthy: usize,
    pub routing_registered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessStatus {
    pub url: String,
    pub expected: usize,
    pub observed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.active, &self.state_error) {
            (Some(color), _) => writeln!(f, "{}: {color} active", self.environment)?,
            (None, Some(err)) => writeln!(f, "{}: color state unusable: {err}", self.environment)?,
            (None, None) => writeln!(f, "{}: no color state", self.environment)?,
        }
        match (&self.live_target, &self.routing_error) {
            (Some(target), _) => writeln!(f, "  routing -> {target}")?,
            (None, Some(err)) => writeln!(f, "  routing unreadable: {err}")?,
            (None, None) => {}
        }
        for color in &self.colors {
            let marker = if color.active { "*" } else { " " };
            let version = color
                .version
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string);
            match (&color.capacity, &color.error) {
                (Some(capacity), _) => writeln!(
                    f,
                    "{marker} {:<5} {} [{capacity}] version {version}, {}/{} serving, {}/{} healthy in {}",
                    color.color.as_str(),
                    color.fleet,
                    color.serving,
                    color.instances,
                    color.routing_healthy,
                    color.routing_registered,
                    color.target,
                )?,
                (None, Some(err)) => {
                    writeln!(f, "{marker} {:<5} {}: {err}", color.color.as_str(), color.fleet)?
                }
                (None, None) => writeln!(f, "{marker} {:<5} {}", color.color.as_str(), color.fleet)?,
            }
        }
        if let Some(readiness) = &self.readiness {
            match (readiness.observed, &readiness.error) {
                (Some(n), _) => write!(f, "  readiness {n}/{} at {}", readiness.expected, readiness.url)?,
                (None, Some(err)) => write!(f, "  readiness unknown at {}: {err}", readiness.url)?,
                (None, None) => write!(f, "  readiness unknown at {}", readiness.url)?,
            }
        }
        Ok(())
    }
}

/// One invariant checked by `validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub environment: EnvironmentName,
    pub checks: Vec<ValidationCheck>,
}

impl ValidationReport {
    pub(crate) fn new(environment: EnvironmentName) -> Self {
        Self {
            environment,
            checks: Vec::new(),
        }
    }

    pub(crate) fn check(&mut self, name: &str, outcome: Result<String, String>) {
        let (passed, detail) = match outcome {
            Ok(detail) => (true, detail),
            Err(detail) => (false, detail),
        };
        self.checks.push(ValidationCheck {
            name: name.to_string(),
            passed,
            detail,
        });
    }

    pub fn is_valid(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .checks
            .iter()
            .map(|c| {
                let mark = if c.passed { "ok  " } else { "FAIL" };
                format!("{mark} {:<22} {}", c.name, c.detail)
            })
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseEntry {
    pub version: Version,
    pub branch: String,
    pub created_at: DateTime<Utc>,
    /// Colors of this environment assigned the release.
    pub colors: Vec<Color>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseListing {
    pub environment: EnvironmentName,
    pub releases: Vec<ReleaseEntry>,
}

impl fmt::Display for ReleaseListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.releases.is_empty() {
            return f.write_str("no releases");
        }
        let lines: Vec<String> = self
            .releases
            .iter()
            .map(|r| {
                let colors: Vec<&str> = r.colors.iter().map(|c| c.as_str()).collect();
                let marker = if colors.is_empty() {
                    String::new()
                } else {
                    format!("  <- {}", colors.join(", "))
                };
                format!(
                    "{:<24} {:<16} {}{marker}",
                    r.version.as_str(),
                    r.branch,
                    r.created_at.format("%Y-%m-%d %H:%M")
                )
            })
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_counts_failures() {
        let mut report = ValidationReport::new(EnvironmentName::new("beta").unwrap());
        report.check("config", Ok("consistent".to_string()));
        report.check("state-matches-routing", Err("state says blue".to_string()));
        assert!(!report.is_valid());
        assert_eq!(report.failed(), 1);
        assert!(report.to_string().contains("FAIL state-matches-routing"));
    }

    #[test]
    fn deploy_outcome_serializes_with_tag() {
        let plan = DeployPlan {
            environment: EnvironmentName::new("beta").unwrap(),
            active: Color::Blue,
            target: Color::Green,
            version: None,
            capacity: Capacity::new(2, 2, 2),
            former: FormerFleet::ReleaseMin,
            discovery_required: false,
            readiness_probe: false,
        };
        let json = serde_json::to_value(DeployOutcome::Planned(plan)).unwrap();
        assert_eq!(json["outcome"], "planned");
        assert_eq!(json["target"], "green");
        assert_eq!(json["former"], "release-min");
    }
}
