// ABOUTME: Protection snapshots and the scope that guarantees their restoration.
// ABOUTME: Snapshots are restored in reverse order exactly once, whatever the run's outcome.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{FleetController, FleetError};
use crate::types::{Color, FleetId};

/// Capacity bounds of one fleet captured before it was frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionSnapshot {
    pub color: Color,
    pub fleet: FleetId,
    pub min: u32,
    pub max: u32,
    consumed: bool,
}

impl ProtectionSnapshot {
    pub(crate) fn new(color: Color, fleet: FleetId, min: u32, max: u32) -> Self {
        Self {
            color,
            fleet,
            min,
            max,
            consumed: false,
        }
    }

    /// Whether the prior bounds have already been put back.
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    pub(crate) fn mark_consumed(&mut self) {
        self.consumed = true;
    }
}

/// Shared handle to the snapshots taken during one protected run.
#[derive(Debug, Clone, Default)]
pub struct ProtectionHandle {
    snapshots: Arc<Mutex<Vec<ProtectionSnapshot>>>,
}

impl ProtectionHandle {
    /// Freeze `color` and record its snapshot.
    pub async fn protect(
        &self,
        fleets: &FleetController<'_>,
        color: Color,
    ) -> Result<ProtectionSnapshot, FleetError> {
        let snapshot = fleets.protect(color).await?;
        self.snapshots.lock().push(snapshot.clone());
        Ok(snapshot)
    }

    /// Restore the snapshot recorded for `color`, if it is still outstanding.
    pub async fn restore(
        &self,
        fleets: &FleetController<'_>,
        color: Color,
    ) -> Result<bool, FleetError> {
        let pending = self
            .snapshots
            .lock()
            .iter()
            .rposition(|s| s.color == color && !s.is_consumed());
        let Some(index) = pending else {
            return Ok(false);
        };
        self.restore_at(fleets, index).await
    }

    /// Restore every outstanding snapshot, newest first. Keeps going past
    /// failures and returns them all.
    pub async fn restore_all(&self, fleets: &FleetController<'_>) -> Vec<FleetError> {
        let count = self.snapshots.lock().len();
        let mut failures = Vec::new();
        for index in (0..count).rev() {
            if let Err(e) = self.restore_at(fleets, index).await {
                failures.push(e);
            }
        }
        failures
    }

    pub fn outstanding(&self) -> usize {
        self.snapshots
            .lock()
            .iter()
            .filter(|s| !s.is_consumed())
            .count()
    }

    async fn restore_at(
        &self,
        fleets: &FleetController<'_>,
        index: usize,
    ) -> Result<bool, FleetError> {
        // Work on a copy so the lock is never held across the API call.
        let Some(mut snapshot) = self.snapshots.lock().get(index).cloned() else {
            return Ok(false);
        };
        let restored = fleets.restore(&mut snapshot).await?;
        if let Some(slot) = self.snapshots.lock().get_mut(index) {
            slot.mark_consumed();
        }
        Ok(restored)
    }
}

/// Outcome of a protected run: the body's result plus any restore failures.
#[derive(Debug)]
pub struct ScopeOutcome<T, E> {
    pub result: Result<T, E>,
    pub restore_failures: Vec<String>,
}

/// Run `body` with a fresh protection handle, then restore every snapshot the
/// body left outstanding. Runs on success, failure and interrupt alike; the
/// unwind is abandoned after `unwind_timeout`.
pub async fn protected<T, E, F, Fut>(
    fleets: &FleetController<'_>,
    unwind_timeout: Duration,
    body: F,
) -> ScopeOutcome<T, E>
where
    F: FnOnce(ProtectionHandle) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let handle = ProtectionHandle::default();
    let result = body(handle.clone()).await;
    let restore_failures = match tokio::time::timeout(unwind_timeout, handle.restore_all(fleets))
        .await
    {
        Ok(failures) => failures.iter().map(ToString::to_string).collect(),
        Err(_) => vec![format!(
            "restoring {} protected fleet(s) did not finish within {}",
            handle.outstanding(),
            humantime_serde::re::humantime::format_duration(unwind_timeout)
        )],
    };
    ScopeOutcome {
        result,
        restore_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{Capacity, CloudDocument, ScalingApi, SimulatedCloud};
    use crate::config::{ColorConfig, EnvironmentConfig, RoutingConfig};
    use crate::types::{RuleId, TargetId};

    fn env() -> EnvironmentConfig {
        EnvironmentConfig {
            capacity_ceiling: 6,
            autoscaling: true,
            readiness_required: false,
            readiness: None,
            discovery_source: None,
            routing: RoutingConfig::Rule {
                rule: RuleId::new("rule"),
            },
            blue: ColorConfig {
                fleet: FleetId::new("blue"),
                target: TargetId::new("tg-blue"),
            },
            green: ColorConfig {
                fleet: FleetId::new("green"),
                target: TargetId::new("tg-green"),
            },
            health: None,
        }
    }

    fn cloud() -> SimulatedCloud {
        let mut doc = CloudDocument::default();
        doc.add_fleet(
            FleetId::new("blue"),
            Capacity::new(2, 1, 6),
            TargetId::new("tg-blue"),
        );
        doc.add_fleet(
            FleetId::new("green"),
            Capacity::new(0, 0, 6),
            TargetId::new("tg-green"),
        );
        SimulatedCloud::in_memory(doc)
    }

    #[tokio::test]
    async fn protect_freezes_and_restore_is_idempotent() {
        let cloud = cloud();
        let env = env();
        let fleets = FleetController::new(&cloud, &env);

        let mut snapshot = fleets.protect(Color::Blue).await.unwrap();
        assert_eq!((snapshot.min, snapshot.max), (1, 6));
        assert_eq!(
            fleets.get_capacity(Color::Blue).await.unwrap(),
            Capacity::new(2, 2, 2)
        );

        assert!(fleets.restore(&mut snapshot).await.unwrap());
        let once = fleets.get_capacity(Color::Blue).await.unwrap();
        assert!(!fleets.restore(&mut snapshot).await.unwrap());
        let twice = fleets.get_capacity(Color::Blue).await.unwrap();
        assert_eq!(once, Capacity::new(2, 1, 6));
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn scope_restores_in_reverse_even_on_error() {
        let cloud = cloud();
        let env = env();
        let fleets = &FleetController::new(&cloud, &env);

        let outcome: ScopeOutcome<(), &str> =
            protected(fleets, Duration::from_secs(5), |guard| async move {
                guard.protect(fleets, Color::Blue).await.map_err(|_| "protect")?;
                guard.protect(fleets, Color::Green).await.map_err(|_| "protect")?;
                Err("health timeout")
            })
            .await;

        assert_eq!(outcome.result, Err("health timeout"));
        assert!(outcome.restore_failures.is_empty());
        let blue = cloud.describe_fleet(&FleetId::new("blue")).await.unwrap();
        assert_eq!(blue.capacity, Capacity::new(2, 1, 6));
        let green = cloud.describe_fleet(&FleetId::new("green")).await.unwrap();
        assert_eq!(green.capacity, Capacity::new(0, 0, 6));
    }

    #[tokio::test]
    async fn handle_restore_consumes_once() {
        let cloud = cloud();
        let env = env();
        let fleets = FleetController::new(&cloud, &env);
        let handle = ProtectionHandle::default();

        handle.protect(&fleets, Color::Blue).await.unwrap();
        assert_eq!(handle.outstanding(), 1);
        assert!(handle.restore(&fleets, Color::Blue).await.unwrap());
        assert!(!handle.restore(&fleets, Color::Blue).await.unwrap());
        assert_eq!(handle.outstanding(), 0);
        assert!(handle.restore_all(&fleets).await.is_empty());
    }
}
