// ABOUTME: Test support utilities.
// ABOUTME: Builds simulated clouds, environment configs, and orchestrators for integration tests.

use fleetswap::cloud::{CloudDocument, Collaborators, SimulatedCloud};
use fleetswap::config::{ColorConfig, EnvironmentConfig, HealthConfig, RoutingConfig};
use fleetswap::deploy::Orchestrator;
use fleetswap::health::ReadinessProbe;
use fleetswap::prompt::FixedAnswer;
use fleetswap::types::{Color, EnvironmentName, FleetId, ListenerId, RuleId, TargetId, Version};
use nonempty::nonempty;
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("fleetswap=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn colors(prefix: &str) -> (ColorConfig, ColorConfig) {
    (
        ColorConfig {
            fleet: FleetId::new(format!("{prefix}-blue")),
            target: TargetId::new(format!("tg-{prefix}-blue")),
        },
        ColorConfig {
            fleet: FleetId::new(format!("{prefix}-green")),
            target: TargetId::new(format!("tg-{prefix}-green")),
        },
    )
}

/// Rule-routed environment without a discovery requirement.
#[allow(dead_code)]
pub fn beta_config() -> EnvironmentConfig {
    let (blue, green) = colors("beta");
    EnvironmentConfig {
        capacity_ceiling: 4,
        autoscaling: false,
        readiness_required: false,
        readiness: None,
        discovery_source: None,
        routing: RoutingConfig::Rule {
            rule: RuleId::new("beta-path-rule"),
        },
        blue,
        green,
        health: None,
    }
}

/// Listener-routed environment that needs a discovery artifact before switching.
#[allow(dead_code)]
pub fn prod_config() -> EnvironmentConfig {
    let (blue, green) = colors("prod");
    EnvironmentConfig {
        capacity_ceiling: 12,
        autoscaling: true,
        readiness_required: true,
        readiness: None,
        discovery_source: Some(beta()),
        routing: RoutingConfig::DefaultAction {
            listeners: nonempty![ListenerId::new("prod-http"), ListenerId::new("prod-https")],
        },
        blue,
        green,
        health: None,
    }
}

#[allow(dead_code)]
pub fn beta() -> EnvironmentName {
    EnvironmentName::new("beta").unwrap()
}

#[allow(dead_code)]
pub fn prod() -> EnvironmentName {
    EnvironmentName::new("prod").unwrap()
}

#[allow(dead_code)]
pub fn version(v: &str) -> Version {
    Version::new(v).unwrap()
}

/// Short timings so failing waits end quickly under a paused clock.
#[allow(dead_code)]
pub fn timings() -> HealthConfig {
    HealthConfig {
        poll_interval: Duration::from_secs(2),
        fleet_timeout: Duration::from_secs(10),
        routing_timeout: Duration::from_secs(10),
        readiness_timeout: Duration::from_secs(10),
        cleanup_timeout: Duration::from_secs(5),
    }
}

/// Cloud with both environments seeded blue-active and releases v122/v123,
/// blue assigned v122.
#[allow(dead_code)]
pub fn cloud() -> Arc<SimulatedCloud> {
    let mut doc = CloudDocument::default();
    doc.add_release(version("v122"), "main");
    doc.add_release(version("v123"), "main");
    for (name, config) in [(beta(), beta_config()), (prod(), prod_config())] {
        doc.seed_environment(&name, &config);
        doc.assign_version(&name, Color::Blue, version("v122"));
    }
    Arc::new(SimulatedCloud::in_memory(doc))
}

/// Orchestrator for `name` that answers every prompt with `answer`.
#[allow(dead_code)]
pub fn orchestrator(
    cloud: &Arc<SimulatedCloud>,
    name: EnvironmentName,
    config: EnvironmentConfig,
    answer: bool,
) -> Orchestrator {
    Orchestrator::new(
        name,
        config,
        timings(),
        Collaborators::simulated(Arc::clone(cloud)),
    )
    .with_confirmation(Arc::new(FixedAnswer(answer)))
}

#[allow(dead_code)]
pub fn beta_orchestrator(cloud: &Arc<SimulatedCloud>) -> Orchestrator {
    orchestrator(cloud, beta(), beta_config(), true)
}

#[allow(dead_code)]
pub fn prod_orchestrator(cloud: &Arc<SimulatedCloud>) -> Orchestrator {
    orchestrator(cloud, prod(), prod_config(), true)
}

/// Readiness probe reporting a fixed count.
#[allow(dead_code)]
pub struct FixedProbe(pub usize);

#[async_trait::async_trait]
impl ReadinessProbe for FixedProbe {
    async fn count(&self, _url: &str) -> Result<usize, fleetswap::health::ProbeError> {
        Ok(self.0)
    }
}

/// Current capacity of `fleet`.
#[allow(dead_code)]
pub fn capacity(cloud: &SimulatedCloud, fleet: &str) -> fleetswap::cloud::Capacity {
    cloud.snapshot().fleets[&FleetId::new(fleet)].capacity
}

/// Active color recorded in color state.
#[allow(dead_code)]
pub fn recorded_color(cloud: &SimulatedCloud, name: &EnvironmentName) -> Option<String> {
    cloud
        .snapshot()
        .states
        .get(name)
        .and_then(|record| record.active_color.clone())
}

/// Make newly launched instances of `fleet` stay pending forever.
#[allow(dead_code)]
pub fn never_healthy(cloud: &SimulatedCloud, fleet: &str) {
    cloud
        .edit(|doc| {
            if let Some(record) = doc.fleets.get_mut(&FleetId::new(fleet)) {
                record.launches_healthy = false;
            }
        })
        .unwrap();
}
