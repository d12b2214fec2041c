// ABOUTME: Integration tests for status, validate, cleanup, shutdown, and release listing.
// ABOUTME: Read-only commands report problems inline; scale-down commands guard the active color.

mod support;

use async_trait::async_trait;
use fleetswap::cloud::{Capacity, SimulatedCloud, StateRecord};
use fleetswap::deploy::{CommandOptions, DeployErrorKind, DeployRequest};
use fleetswap::prompt::Confirmation;
use fleetswap::types::{Color, FleetId, RuleId, TargetId};
use std::sync::Arc;
use support::*;

fn unattended() -> CommandOptions {
    CommandOptions {
        skip_confirmation: true,
        ..CommandOptions::default()
    }
}

#[tokio::test]
async fn status_reports_active_color_and_counts() {
    let cloud = cloud();

    let status = beta_orchestrator(&cloud).status().await.unwrap();

    assert_eq!(status.active, Some(Color::Blue));
    assert_eq!(status.live_target, Some(TargetId::new("tg-beta-blue")));
    let blue = &status.colors[0];
    assert!(blue.active && blue.routed);
    assert_eq!(blue.serving, 1);
    assert_eq!(blue.routing_healthy, 1);
    assert_eq!(blue.version, Some(version("v122")));
    assert_eq!(status.colors[1].capacity, Some(Capacity::new(0, 0, 4)));
}

#[tokio::test]
async fn status_survives_missing_color_state() {
    let cloud = cloud();
    cloud.edit(|doc| doc.states.clear()).unwrap();

    let status = beta_orchestrator(&cloud).status().await.unwrap();

    assert_eq!(status.active, None);
    assert!(status.state_error.is_some());
    assert!(status.to_string().contains("color state unusable"));
}

#[tokio::test]
async fn validate_passes_on_a_consistent_environment() {
    let cloud = cloud();

    let report = beta_orchestrator(&cloud).validate().await.unwrap();

    assert!(report.is_valid(), "{report}");
}

#[tokio::test]
async fn validate_flags_state_that_disagrees_with_routing() {
    let cloud = cloud();
    cloud
        .edit(|doc| {
            if let Some(rule) = doc.rules.get_mut(&RuleId::new("beta-path-rule")) {
                rule.target = TargetId::new("tg-beta-green");
            }
        })
        .unwrap();

    let report = beta_orchestrator(&cloud).validate().await.unwrap();

    assert!(!report.is_valid());
    let failed: Vec<&str> = report
        .checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| c.name.as_str())
        .collect();
    assert!(failed.contains(&"state-matches-routing"), "{failed:?}");
}

#[tokio::test]
async fn validate_flags_state_naming_the_wrong_target() {
    let cloud = cloud();
    cloud
        .edit(|doc| doc.set_state(&beta(), Color::Blue, &TargetId::new("tg-beta-green")))
        .unwrap();

    let orchestrator = beta_orchestrator(&cloud);
    let report = orchestrator.validate().await.unwrap();

    assert!(report.checks.iter().any(|c| c.name == "color-state" && !c.passed));
    let err = orchestrator.resolve().await.unwrap_err();
    assert_eq!(err.kind(), DeployErrorKind::Config);
}

#[tokio::test]
async fn cleanup_refuses_the_active_color() {
    let cloud = cloud();

    let err = beta_orchestrator(&cloud)
        .cleanup(Some(Color::Blue), unattended())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Config);
    assert_eq!(capacity(&cloud, "beta-blue"), Capacity::new(1, 1, 4));
}

#[tokio::test]
async fn cleanup_scales_the_inactive_color_to_zero() {
    let cloud = cloud();
    cloud
        .edit(|doc| {
            if let Some(fleet) = doc.fleets.get_mut(&FleetId::new("beta-green")) {
                fleet.capacity = Capacity::new(2, 1, 4);
            }
        })
        .unwrap();

    let report = beta_orchestrator(&cloud)
        .cleanup(None, unattended())
        .await
        .unwrap();

    assert_eq!(report.fleets.len(), 1);
    assert_eq!(report.fleets[0].color, Color::Green);
    assert_eq!(capacity(&cloud, "beta-green").desired, 0);
    assert_eq!(capacity(&cloud, "beta-green").min, 0);
}

/// Says yes, after another operator has moved beta's traffic to green.
struct SwitchedMeanwhile(Arc<SimulatedCloud>);

#[async_trait]
impl Confirmation for SwitchedMeanwhile {
    async fn confirm(&self, _question: &str) -> std::io::Result<bool> {
        self.0
            .edit(|doc| {
                doc.states.insert(
                    beta(),
                    StateRecord {
                        active_color: Some("green".to_string()),
                        active_target: Some("tg-beta-green".to_string()),
                    },
                );
                if let Some(rule) = doc.rules.get_mut(&RuleId::new("beta-path-rule")) {
                    rule.target = TargetId::new("tg-beta-green");
                }
            })
            .map_err(std::io::Error::other)?;
        Ok(true)
    }
}

#[tokio::test]
async fn cleanup_rechecks_the_active_color_after_confirmation() {
    let cloud = cloud();
    cloud
        .edit(|doc| {
            if let Some(fleet) = doc.fleets.get_mut(&FleetId::new("beta-green")) {
                fleet.capacity = Capacity::new(2, 1, 4);
            }
        })
        .unwrap();

    let err = beta_orchestrator(&cloud)
        .with_confirmation(Arc::new(SwitchedMeanwhile(Arc::clone(&cloud))))
        .cleanup(None, CommandOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Config, "{err}");
    // Green went live while the prompt was open and keeps its capacity.
    assert_eq!(capacity(&cloud, "beta-green"), Capacity::new(2, 1, 4));
    assert!(cloud.snapshot().leases.is_empty());
}

#[tokio::test]
async fn deploy_rechecks_the_active_color_after_confirmation() {
    let cloud = cloud();

    let err = beta_orchestrator(&cloud)
        .with_confirmation(Arc::new(SwitchedMeanwhile(Arc::clone(&cloud))))
        .deploy(&DeployRequest {
            version: Some(version("v123")),
            capacity: Some(1),
            ..DeployRequest::default()
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Config, "{err}");
    assert_eq!(capacity(&cloud, "beta-green"), Capacity::new(0, 0, 4));
    assert_eq!(capacity(&cloud, "beta-blue"), Capacity::new(1, 1, 4));
    assert_eq!(recorded_color(&cloud, &beta()).as_deref(), Some("green"));
}

#[tokio::test]
async fn shutdown_scales_both_colors_inactive_first() {
    let cloud = cloud();

    let report = beta_orchestrator(&cloud)
        .shutdown(unattended())
        .await
        .unwrap();

    let order: Vec<Color> = report.fleets.iter().map(|f| f.color).collect();
    assert_eq!(order, vec![Color::Green, Color::Blue]);
    assert_eq!(capacity(&cloud, "beta-blue").desired, 0);
    // Color state is not touched.
    assert_eq!(recorded_color(&cloud, &beta()).as_deref(), Some("blue"));
}

#[tokio::test]
async fn unattended_shutdown_of_guarded_environment_is_refused() {
    let cloud = cloud();

    let err = prod_orchestrator(&cloud)
        .shutdown(unattended())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Config);
    assert_eq!(capacity(&cloud, "prod-blue").desired, 1);
}

#[tokio::test]
async fn release_listing_marks_assigned_colors() {
    let cloud = cloud();

    let listing = beta_orchestrator(&cloud).list_releases(None).await.unwrap();

    let v122 = listing
        .releases
        .iter()
        .find(|r| r.version == version("v122"))
        .unwrap();
    assert_eq!(v122.colors, vec![Color::Blue]);
    assert_eq!(listing.releases.len(), 2);

    let none = beta_orchestrator(&cloud)
        .list_releases(Some("feature-x"))
        .await
        .unwrap();
    assert!(none.releases.is_empty());
}
