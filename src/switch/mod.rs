// ABOUTME: Traffic switch for one environment: moves routing to a color and records it.
// ABOUTME: Routing is verified after every change and color state is written only afterwards.

mod error;
mod route;

pub use error::SwitchError;
pub use route::{DefaultActionSwitch, RouteSwitch, RuleSwitch};

use serde::Serialize;

use crate::cloud::{CloudError, ColorStateStore, LoadBalancerApi, StateRecord};
use crate::config::{EnvironmentConfig, RoutingConfig};
use crate::types::{Color, EnvironmentName, TargetId};

/// A completed routing change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchOutcome {
    pub previous: TargetId,
    pub current: TargetId,
}

impl SwitchOutcome {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

pub struct TrafficSwitch<'a> {
    name: &'a EnvironmentName,
    env: &'a EnvironmentConfig,
    state: &'a dyn ColorStateStore,
    route: Box<dyn RouteSwitch + 'a>,
}

impl<'a> TrafficSwitch<'a> {
    pub fn new(
        name: &'a EnvironmentName,
        env: &'a EnvironmentConfig,
        balancer: &'a dyn LoadBalancerApi,
        state: &'a dyn ColorStateStore,
    ) -> Self {
        let route: Box<dyn RouteSwitch + 'a> = match &env.routing {
            RoutingConfig::Rule { rule } => Box::new(RuleSwitch::new(balancer, rule.clone())),
            RoutingConfig::DefaultAction { listeners } => {
                Box::new(DefaultActionSwitch::new(balancer, listeners.clone()))
            }
        };
        Self {
            name,
            env,
            state,
            route,
        }
    }

    /// Active routing target as recorded in color state.
    pub async fn current_target(&self) -> Result<Option<TargetId>, CloudError> {
        let record = self.state.load(self.name).await?;
        Ok(record
            .and_then(|r| r.active_target)
            .map(TargetId::new))
    }

    /// Target the load balancer actually forwards to.
    pub async fn live_target(&self) -> Result<TargetId, SwitchError> {
        self.route.live_target().await
    }

    /// Point every route at `color`'s target and confirm it took effect.
    pub async fn switch(&self, color: Color) -> Result<SwitchOutcome, SwitchError> {
        let target = self.env.color(color).target.clone();
        let previous = match self.route.live_target().await {
            Ok(previous) => previous,
            Err(SwitchError::Inconsistent { routes }) => {
                // Finish a switch an earlier run left half done.
                tracing::warn!(?routes, "routes disagree, forwarding all of them");
                self.env.color(color.other()).target.clone()
            }
            Err(e) => return Err(e),
        };
        if previous == target {
            tracing::info!(%color, %target, "routes already forward to target");
            return Ok(SwitchOutcome {
                previous,
                current: target,
            });
        }

        self.route.point_at(&target).await?;
        let verified = match self.route.live_target().await {
            Ok(actual) if actual == target => Ok(()),
            Ok(actual) => Err(SwitchError::Unverified {
                expected: target.clone(),
                actual,
            }),
            Err(e) => Err(e),
        };
        if let Err(err) = verified {
            return Err(self.put_back(&previous, err).await);
        }
        tracing::info!(%color, from = %previous, to = %target, "traffic switched");
        Ok(SwitchOutcome {
            previous,
            current: target,
        })
    }

    /// Route back to `previous` after an unconfirmed switch. `err` comes back
    /// as is only when routing is confirmed on `previous` again.
    async fn put_back(&self, previous: &TargetId, err: SwitchError) -> SwitchError {
        tracing::warn!(error = %err, %previous, "switch not confirmed, routing back");
        let revert = match self.route.point_at(previous).await {
            Ok(()) => match self.route.live_target().await {
                Ok(actual) if &actual == previous => Ok(()),
                Ok(actual) => Err(format!("routes point at {actual}")),
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(e.to_string()),
        };
        match revert {
            Ok(()) => {
                tracing::warn!(target = %previous, "traffic switch reverted");
                err
            }
            Err(revert) => SwitchError::Unconfirmed {
                previous: previous.clone(),
                cause: Box::new(err),
                revert,
            },
        }
    }

    /// Point routes back at `previous` after a later step failed.
    pub async fn revert(&self, outcome: &SwitchOutcome) -> Result<(), SwitchError> {
        if !outcome.changed() {
            return Ok(());
        }
        self.route.point_at(&outcome.previous).await?;
        tracing::warn!(target = %outcome.previous, "traffic switch reverted");
        Ok(())
    }

    /// Record `color` as active. The single color-state write of a switch.
    pub async fn commit(&self, color: Color) -> Result<(), CloudError> {
        let record = StateRecord {
            active_color: Some(color.to_string()),
            active_target: Some(self.env.color(color).target.to_string()),
        };
        self.state.save(self.name, &record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{CloudDocument, SimulatedCloud, TargetHealth};
    use crate::config::ColorConfig;
    use crate::types::{FleetId, ListenerId, RuleId};
    use async_trait::async_trait;
    use nonempty::nonempty;
    use parking_lot::Mutex;

    fn env(routing: RoutingConfig) -> EnvironmentConfig {
        EnvironmentConfig {
            capacity_ceiling: 4,
            autoscaling: false,
            readiness_required: false,
            readiness: None,
            discovery_source: None,
            routing,
            blue: ColorConfig {
                fleet: FleetId::new("blue-fleet"),
                target: TargetId::new("tg-blue"),
            },
            green: ColorConfig {
                fleet: FleetId::new("green-fleet"),
                target: TargetId::new("tg-green"),
            },
            health: None,
        }
    }

    fn listeners_env() -> EnvironmentConfig {
        env(RoutingConfig::DefaultAction {
            listeners: nonempty![ListenerId::new("http"), ListenerId::new("https")],
        })
    }

    fn seeded(config: &EnvironmentConfig, name: &EnvironmentName) -> SimulatedCloud {
        let mut doc = CloudDocument::default();
        doc.seed_environment(name, config);
        SimulatedCloud::in_memory(doc)
    }

    #[tokio::test]
    async fn rule_switch_moves_and_verifies() {
        let name = EnvironmentName::new("beta").unwrap();
        let config = env(RoutingConfig::Rule {
            rule: RuleId::new("api-rule"),
        });
        let cloud = seeded(&config, &name);
        let switch = TrafficSwitch::new(&name, &config, &cloud, &cloud);

        let outcome = switch.switch(Color::Green).await.unwrap();
        assert!(outcome.changed());
        assert_eq!(switch.live_target().await.unwrap(), TargetId::new("tg-green"));
        // Routing moved, state not yet.
        assert_eq!(
            switch.current_target().await.unwrap(),
            Some(TargetId::new("tg-blue"))
        );

        switch.commit(Color::Green).await.unwrap();
        assert_eq!(
            switch.current_target().await.unwrap(),
            Some(TargetId::new("tg-green"))
        );
    }

    #[tokio::test]
    async fn failing_second_listener_reverts_the_first() {
        let name = EnvironmentName::new("prod").unwrap();
        let config = listeners_env();
        let cloud = seeded(&config, &name);
        cloud
            .edit(|doc| {
                if let Some(route) = doc.listeners.get_mut(&ListenerId::new("https")) {
                    route.fail_updates = true;
                }
            })
            .unwrap();
        let switch = TrafficSwitch::new(&name, &config, &cloud, &cloud);

        let err = switch.switch(Color::Green).await.unwrap_err();
        assert!(
            matches!(err, SwitchError::Route { reverted: 1, .. }),
            "unexpected error: {err}"
        );
        assert!(!err.is_stranded());
        let doc = cloud.snapshot();
        for listener in ["http", "https"] {
            assert_eq!(
                doc.listeners[&ListenerId::new(listener)].target,
                TargetId::new("tg-blue")
            );
        }
    }

    /// Balancer whose listener updates fail from the `fail_from`th call on.
    struct FlakyBalancer {
        inner: SimulatedCloud,
        calls: Mutex<usize>,
        fail_from: usize,
    }

    #[async_trait]
    impl LoadBalancerApi for FlakyBalancer {
        async fn listener_target(&self, listener: &ListenerId) -> Result<TargetId, CloudError> {
            self.inner.listener_target(listener).await
        }

        async fn set_listener_target(
            &self,
            listener: &ListenerId,
            target: &TargetId,
        ) -> Result<(), CloudError> {
            let call = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls
            };
            if call >= self.fail_from {
                return Err(CloudError::rejected("modify-listener", "throttled"));
            }
            self.inner.set_listener_target(listener, target).await
        }

        async fn rule_target(&self, rule: &RuleId) -> Result<TargetId, CloudError> {
            self.inner.rule_target(rule).await
        }

        async fn set_rule_target(
            &self,
            rule: &RuleId,
            target: &TargetId,
        ) -> Result<(), CloudError> {
            self.inner.set_rule_target(rule, target).await
        }

        async fn target_health(&self, target: &TargetId) -> Result<Vec<TargetHealth>, CloudError> {
            self.inner.target_health(target).await
        }

        async fn target_exists(&self, target: &TargetId) -> Result<bool, CloudError> {
            self.inner.target_exists(target).await
        }
    }

    #[tokio::test]
    async fn failed_revert_reports_stranded_listeners() {
        let name = EnvironmentName::new("prod").unwrap();
        let config = listeners_env();
        let inner = seeded(&config, &name);
        let balancer = FlakyBalancer {
            inner,
            calls: Mutex::new(0),
            fail_from: 2,
        };
        let switch = TrafficSwitch::new(&name, &config, &balancer, &balancer.inner);

        let err = switch.switch(Color::Green).await.unwrap_err();
        let SwitchError::Partial { stranded, .. } = &err else {
            panic!("expected partial switch, got {err}");
        };
        assert_eq!(stranded, &vec!["listener http".to_string()]);
        assert!(err.is_stranded());
    }

    /// Balancer that accepts rule updates and then ignores them.
    struct IgnoresRuleUpdates(SimulatedCloud);

    #[async_trait]
    impl LoadBalancerApi for IgnoresRuleUpdates {
        async fn listener_target(&self, listener: &ListenerId) -> Result<TargetId, CloudError> {
            self.0.listener_target(listener).await
        }

        async fn set_listener_target(
            &self,
            listener: &ListenerId,
            target: &TargetId,
        ) -> Result<(), CloudError> {
            self.0.set_listener_target(listener, target).await
        }

        async fn rule_target(&self, rule: &RuleId) -> Result<TargetId, CloudError> {
            self.0.rule_target(rule).await
        }

        async fn set_rule_target(&self, _: &RuleId, _: &TargetId) -> Result<(), CloudError> {
            Ok(())
        }

        async fn target_health(&self, target: &TargetId) -> Result<Vec<TargetHealth>, CloudError> {
            self.0.target_health(target).await
        }

        async fn target_exists(&self, target: &TargetId) -> Result<bool, CloudError> {
            self.0.target_exists(target).await
        }
    }

    #[tokio::test]
    async fn unverified_switch_is_clean_once_routed_back() {
        let name = EnvironmentName::new("beta").unwrap();
        let config = env(RoutingConfig::Rule {
            rule: RuleId::new("api-rule"),
        });
        let balancer = IgnoresRuleUpdates(seeded(&config, &name));
        let switch = TrafficSwitch::new(&name, &config, &balancer, &balancer.0);

        let err = switch.switch(Color::Green).await.unwrap_err();
        assert!(
            matches!(err, SwitchError::Unverified { ref actual, .. } if actual == &TargetId::new("tg-blue")),
            "unexpected error: {err}"
        );
        assert!(!err.is_stranded());
    }

    #[tokio::test]
    async fn disagreeing_listeners_are_reported() {
        let name = EnvironmentName::new("prod").unwrap();
        let config = listeners_env();
        let cloud = seeded(&config, &name);
        cloud
            .edit(|doc| {
                if let Some(route) = doc.listeners.get_mut(&ListenerId::new("https")) {
                    route.target = TargetId::new("tg-green");
                }
            })
            .unwrap();
        let switch = TrafficSwitch::new(&name, &config, &cloud, &cloud);

        assert!(matches!(
            switch.live_target().await,
            Err(SwitchError::Inconsistent { .. })
        ));
    }
}
