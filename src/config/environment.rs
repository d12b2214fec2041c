// ABOUTME: Per-environment deployment configuration.
// ABOUTME: Fleets and routing targets per color, routing mode, capacity ceiling, readiness policy.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::HealthConfig;
use super::deserialize::deserialize_listeners;
use crate::types::{Color, EnvironmentName, FleetId, ListenerId, RuleId, TargetId};

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    /// Largest max capacity any fleet of this environment may be given.
    pub capacity_ceiling: u32,

    /// Fleets may grow above their deployed size under an external autoscaler.
    #[serde(default)]
    pub autoscaling: bool,

    /// A discovery artifact must exist for the version before traffic moves.
    #[serde(default)]
    pub readiness_required: bool,

    #[serde(default)]
    pub readiness: Option<ReadinessConfig>,

    /// Environment to copy missing discovery artifacts from.
    #[serde(default)]
    pub discovery_source: Option<EnvironmentName>,

    pub routing: RoutingConfig,

    pub blue: ColorConfig,

    pub green: ColorConfig,

    /// Overrides the top-level health timings for this environment.
    #[serde(default)]
    pub health: Option<HealthConfig>,
}

/// The fleet and routing target making up one color.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColorConfig {
    pub fleet: FleetId,
    pub target: TargetId,
}

/// How traffic is pointed at a color.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum RoutingConfig {
    /// One path-scoped rule forwards to the active target.
    Rule { rule: RuleId },
    /// The default action of every listed listener forwards to the active target.
    DefaultAction {
        #[serde(deserialize_with = "deserialize_listeners")]
        listeners: NonEmpty<ListenerId>,
    },
}

/// HTTP readiness probe returning a JSON list.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    pub url: String,
    /// List length at which the fleet counts as fully registered.
    pub min_count: usize,
}

impl EnvironmentConfig {
    pub fn color(&self, color: Color) -> &ColorConfig {
        match color {
            Color::Blue => &self.blue,
            Color::Green => &self.green,
        }
    }

    /// The color whose routing target is `target`, if any.
    pub fn color_of_target(&self, target: &TargetId) -> Option<Color> {
        Color::ALL
            .into_iter()
            .find(|c| &self.color(*c).target == target)
    }

    /// Check internal consistency. Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity_ceiling == 0 {
            return Err("capacity_ceiling must be greater than zero".to_string());
        }
        if self.blue.fleet == self.green.fleet {
            return Err(format!(
                "blue and green share the same fleet '{}'",
                self.blue.fleet
            ));
        }
        if self.blue.target == self.green.target {
            return Err(format!(
                "blue and green share the same routing target '{}'",
                self.blue.target
            ));
        }
        if let Some(readiness) = &self.readiness
            && readiness.url.trim().is_empty()
        {
            return Err("readiness.url cannot be empty".to_string());
        }
        Ok(())
    }
}
