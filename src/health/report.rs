// ABOUTME: Observations gathered while waiting for a fleet to become healthy.
// ABOUTME: Timeouts carry the last observation of every signal checked so far.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::types::{FleetId, InstanceId, TargetId};

/// The independent health signals a fleet must pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Fleet,
    Routing,
    Readiness,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Fleet => "fleet",
            Signal::Routing => "routing",
            Signal::Readiness => "readiness",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetHealth {
    pub fleet: FleetId,
    pub expected: u32,
    /// In service and healthy.
    pub serving: u32,
    pub total: u32,
    /// Instances counted in `serving`.
    #[serde(skip)]
    pub serving_ids: Vec<InstanceId>,
}

impl FleetHealth {
    pub fn is_met(&self) -> bool {
        self.serving == self.expected
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingHealth {
    pub target: TargetId,
    pub expected: usize,
    pub healthy: usize,
    /// Why each not-yet-healthy instance is failing.
    pub failures: BTreeMap<InstanceId, String>,
}

impl RoutingHealth {
    pub fn is_met(&self) -> bool {
        self.failures.is_empty() && self.healthy == self.expected
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessHealth {
    pub url: String,
    pub expected: usize,
    pub observed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ReadinessHealth {
    pub fn is_met(&self) -> bool {
        self.observed.is_some_and(|n| n >= self.expected)
    }
}

/// Everything observed across the signals of one wait.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fleet: Option<FleetHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ReadinessHealth>,
}

impl HealthReport {
    /// Fill signals missing here from `earlier`.
    pub(crate) fn merge(&mut self, earlier: &HealthReport) {
        if self.fleet.is_none() {
            self.fleet = earlier.fleet.clone();
        }
        if self.routing.is_none() {
            self.routing = earlier.routing.clone();
        }
        if self.readiness.is_none() {
            self.readiness = earlier.readiness.clone();
        }
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(fleet) = &self.fleet {
            parts.push(format!(
                "fleet {}/{} serving ({} instances)",
                fleet.serving, fleet.expected, fleet.total
            ));
        }
        if let Some(routing) = &self.routing {
            let mut part = format!("routing {}/{} healthy", routing.healthy, routing.expected);
            if !routing.failures.is_empty() {
                let reasons: Vec<String> = routing
                    .failures
                    .iter()
                    .map(|(id, reason)| format!("{id}: {reason}"))
                    .collect();
                part.push_str(&format!(" [{}]", reasons.join(", ")));
            }
            parts.push(part);
        }
        if let Some(readiness) = &self.readiness {
            let observed = readiness
                .observed
                .map_or_else(|| "none".to_string(), |n| n.to_string());
            let mut part = format!("readiness {observed}/{}", readiness.expected);
            if let Some(err) = &readiness.last_error {
                part.push_str(&format!(" (last error: {err})"));
            }
            parts.push(part);
        }
        if parts.is_empty() {
            f.write_str("no observations")
        } else {
            f.write_str(&parts.join("; "))
        }
    }
}

/// A signal that did not pass before its deadline.
#[derive(Debug, Clone, Serialize)]
pub struct HealthTimeout {
    pub signal: Signal,
    #[serde(with = "humantime_serde")]
    pub waited: Duration,
    pub report: HealthReport,
}

impl fmt::Display for HealthTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} health not reached after {}: {}",
            self.signal,
            humantime_serde::re::humantime::format_duration(self.waited),
            self.report
        )
    }
}

impl std::error::Error for HealthTimeout {}
