// ABOUTME: Load-balancer route updaters for the two routing modes.
// ABOUTME: A path rule is one call; listener default actions are all-or-nothing with revert.

use async_trait::async_trait;
use nonempty::NonEmpty;

use super::SwitchError;
use crate::cloud::LoadBalancerApi;
use crate::types::{ListenerId, RuleId, TargetId};

/// Something that forwards traffic to one routing target.
#[async_trait]
pub trait RouteSwitch: Send + Sync {
    /// Target the routes currently forward to. Fails if they disagree.
    async fn live_target(&self) -> Result<TargetId, SwitchError>;

    /// Forward every route to `target`. On error no route is left changed,
    /// unless the error says otherwise.
    async fn point_at(&self, target: &TargetId) -> Result<(), SwitchError>;
}

pub struct RuleSwitch<'a> {
    balancer: &'a dyn LoadBalancerApi,
    rule: RuleId,
}

impl<'a> RuleSwitch<'a> {
    pub fn new(balancer: &'a dyn LoadBalancerApi, rule: RuleId) -> Self {
        Self { balancer, rule }
    }

    fn route(&self) -> String {
        format!("rule {}", self.rule)
    }
}

#[async_trait]
impl RouteSwitch for RuleSwitch<'_> {
    async fn live_target(&self) -> Result<TargetId, SwitchError> {
        self.balancer
            .rule_target(&self.rule)
            .await
            .map_err(|source| SwitchError::Read {
                route: self.route(),
                source,
            })
    }

    async fn point_at(&self, target: &TargetId) -> Result<(), SwitchError> {
        self.balancer
            .set_rule_target(&self.rule, target)
            .await
            .map_err(|source| SwitchError::Route {
                route: self.route(),
                reverted: 0,
                source,
            })?;
        tracing::info!(rule = %self.rule, %target, "rule forwarded");
        Ok(())
    }
}

pub struct DefaultActionSwitch<'a> {
    balancer: &'a dyn LoadBalancerApi,
    listeners: NonEmpty<ListenerId>,
}

impl<'a> DefaultActionSwitch<'a> {
    pub fn new(balancer: &'a dyn LoadBalancerApi, listeners: NonEmpty<ListenerId>) -> Self {
        Self {
            balancer,
            listeners,
        }
    }

    async fn read(&self, listener: &ListenerId) -> Result<TargetId, SwitchError> {
        self.balancer
            .listener_target(listener)
            .await
            .map_err(|source| SwitchError::Read {
                route: format!("listener {listener}"),
                source,
            })
    }
}

#[async_trait]
impl RouteSwitch for DefaultActionSwitch<'_> {
    async fn live_target(&self) -> Result<TargetId, SwitchError> {
        let head = &self.listeners.head;
        let first = self.read(head).await?;
        let mut routes = Vec::with_capacity(self.listeners.len());
        routes.push((format!("listener {head}"), first.clone()));
        for listener in &self.listeners.tail {
            routes.push((format!("listener {listener}"), self.read(listener).await?));
        }
        if routes.iter().any(|(_, target)| target != &first) {
            return Err(SwitchError::Inconsistent { routes });
        }
        Ok(first)
    }

    async fn point_at(&self, target: &TargetId) -> Result<(), SwitchError> {
        // Listener and the target it forwarded to before we touched it.
        let mut changed: Vec<(&ListenerId, TargetId)> = Vec::new();

        for listener in self.listeners.iter() {
            let previous = self.read(listener).await;
            let previous = match previous {
                Ok(previous) => previous,
                Err(e) => {
                    return Err(self.unwind(changed, e).await);
                }
            };
            if &previous == target {
                continue;
            }
            if let Err(source) = self.balancer.set_listener_target(listener, target).await {
                let err = SwitchError::Route {
                    route: format!("listener {listener}"),
                    reverted: 0,
                    source,
                };
                return Err(self.unwind(changed, err).await);
            }
            tracing::info!(%listener, %target, "listener default action forwarded");
            changed.push((listener, previous));
        }
        Ok(())
    }
}

impl DefaultActionSwitch<'_> {
    /// Put changed listeners back, newest first, and fold the outcome into `err`.
    async fn unwind(&self, changed: Vec<(&ListenerId, TargetId)>, err: SwitchError) -> SwitchError {
        let reverted_total = changed.len();
        let mut stranded = Vec::new();
        for (listener, previous) in changed.into_iter().rev() {
            match self.balancer.set_listener_target(listener, &previous).await {
                Ok(()) => tracing::warn!(%listener, target = %previous, "listener reverted"),
                Err(e) => {
                    tracing::error!(%listener, error = %e, "failed to revert listener");
                    stranded.push(format!("listener {listener}"));
                }
            }
        }

        match err {
            SwitchError::Route { route, source, .. } if stranded.is_empty() => {
                SwitchError::Route {
                    route,
                    reverted: reverted_total,
                    source,
                }
            }
            SwitchError::Route { route, source, .. } | SwitchError::Read { route, source } => {
                if stranded.is_empty() {
                    SwitchError::Read { route, source }
                } else {
                    SwitchError::Partial {
                        route,
                        stranded,
                        source,
                    }
                }
            }
            other => other,
        }
    }
}
