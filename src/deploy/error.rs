// ABOUTME: Error types for deployment operations.
// ABOUTME: One variant per failure class, with a kind() for exit-code mapping.

use chrono::{DateTime, Utc};

use super::Phase;
use crate::cloud::CloudError;
use crate::fleet::{CapacityError, FleetError};
use crate::health::{HealthError, HealthTimeout};
use crate::switch::SwitchError;

/// Errors that can occur while running an orchestrator command.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Color state or configuration makes the request impossible. Nothing was changed.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("capacity error: {0}")]
    Capacity(#[from] CapacityError),

    #[error("health timeout: {0}")]
    HealthTimeout(Box<HealthTimeout>),

    #[error("switch failed: {0}")]
    Switch(#[from] SwitchError),

    /// Readiness artifact missing and could not be provided.
    #[error("discovery check failed: {0}")]
    Discovery(String),

    #[error("interrupted during {phase}")]
    Interrupted { phase: Phase },

    #[error("cancelled by operator")]
    Cancelled,

    /// Another process holds the deploy lease.
    #[error(
        "deploy lease for {} held by {} (pid {}) since {}, running {}; pass --force-unlock to break it",
        .0.environment, .0.holder, .0.pid, .0.started_at, .0.command
    )]
    LeaseHeld(Box<LeaseHolderInfo>),

    #[error("deploy lease error: {0}")]
    Lease(String),

    #[error("{operation} failed: {source}")]
    Cloud {
        operation: String,
        #[source]
        source: CloudError,
    },

    /// Cleanup after a failure did not complete. The original cause is kept.
    #[error("{cause}; cleanup incomplete, manual intervention required: {}", .failures.join("; "))]
    ManualIntervention {
        cause: Box<DeployError>,
        failures: Vec<String>,
    },
}

/// Who holds a deploy lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseHolderInfo {
    pub environment: String,
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub command: String,
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Config,
    Capacity,
    HealthTimeout,
    Switch,
    Discovery,
    Interrupted,
    Cancelled,
    LeaseHeld,
    Cloud,
    ManualIntervention,
}

impl DeployError {
    pub fn config(message: impl Into<String>) -> Self {
        DeployError::Config(message.into())
    }

    pub fn discovery(message: impl Into<String>) -> Self {
        DeployError::Discovery(message.into())
    }

    pub fn lease_error(message: impl Into<String>) -> Self {
        DeployError::Lease(message.into())
    }

    pub fn lease_held(info: LeaseHolderInfo) -> Self {
        DeployError::LeaseHeld(Box::new(info))
    }

    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Config(_) => DeployErrorKind::Config,
            DeployError::Capacity(_) => DeployErrorKind::Capacity,
            DeployError::HealthTimeout(_) => DeployErrorKind::HealthTimeout,
            DeployError::Switch(_) => DeployErrorKind::Switch,
            DeployError::Discovery(_) => DeployErrorKind::Discovery,
            DeployError::Interrupted { .. } => DeployErrorKind::Interrupted,
            DeployError::Cancelled => DeployErrorKind::Cancelled,
            DeployError::LeaseHeld(_) | DeployError::Lease(_) => DeployErrorKind::LeaseHeld,
            DeployError::Cloud { .. } => DeployErrorKind::Cloud,
            DeployError::ManualIntervention { .. } => DeployErrorKind::ManualIntervention,
        }
    }

    /// The failure that started it all, looking through manual-intervention wrapping.
    pub fn root_cause(&self) -> &DeployError {
        match self {
            DeployError::ManualIntervention { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

impl From<FleetError> for DeployError {
    fn from(err: FleetError) -> Self {
        match err {
            FleetError::Capacity(e) => DeployError::Capacity(e),
            FleetError::Cloud {
                operation,
                color,
                source,
            } => DeployError::Cloud {
                operation: format!("{operation} {color} fleet"),
                source,
            },
        }
    }
}

impl DeployError {
    /// Map a health failure seen during `phase`.
    pub(crate) fn from_health(err: HealthError, phase: Phase) -> Self {
        match err {
            HealthError::Timeout(timeout) => DeployError::HealthTimeout(timeout),
            HealthError::Interrupted { .. } => DeployError::Interrupted { phase },
            HealthError::Cloud { signal, source } => DeployError::Cloud {
                operation: format!("{signal} health check"),
                source,
            },
        }
    }
}

/// Extension trait for attaching the operation to collaborator failures.
pub trait CloudResultExt<T> {
    fn during(self, operation: &str) -> Result<T, DeployError>;
}

impl<T> CloudResultExt<T> for Result<T, CloudError> {
    fn during(self, operation: &str) -> Result<T, DeployError> {
        self.map_err(|source| DeployError::Cloud {
            operation: operation.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;

    #[test]
    fn fleet_capacity_errors_keep_their_kind() {
        let err = DeployError::from(FleetError::Capacity(CapacityError::ExceedsCeiling {
            field: "max",
            requested: 9,
            ceiling: 8,
        }));
        assert_eq!(err.kind(), DeployErrorKind::Capacity);
    }

    #[test]
    fn fleet_cloud_errors_name_the_fleet() {
        let err = DeployError::from(FleetError::Cloud {
            operation: "update capacity",
            color: Color::Green,
            source: CloudError::rejected("update-capacity", "throttled"),
        });
        assert_eq!(err.kind(), DeployErrorKind::Cloud);
        assert!(err.to_string().starts_with("update capacity green fleet failed"));
    }

    #[test]
    fn manual_intervention_keeps_root_cause() {
        let err = DeployError::ManualIntervention {
            cause: Box::new(DeployError::Interrupted {
                phase: Phase::AwaitingHealth,
            }),
            failures: vec!["restore blue fleet: throttled".to_string()],
        };
        assert_eq!(err.kind(), DeployErrorKind::ManualIntervention);
        assert_eq!(err.root_cause().kind(), DeployErrorKind::Interrupted);
        let message = err.to_string();
        assert!(message.starts_with("interrupted during awaiting-health"));
        assert!(message.contains("manual intervention required"));
    }

    #[test]
    fn during_names_the_operation() {
        let result: Result<(), CloudError> = Err(CloudError::FleetNotFound {
            fleet: "beta-blue".to_string(),
        });
        let err = result.during("read color state").unwrap_err();
        assert_eq!(
            err.to_string(),
            "read color state failed: fleet not found: beta-blue"
        );
    }
}
