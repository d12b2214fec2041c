// ABOUTME: Application-wide error types for fleetswap.
// ABOUTME: Uses thiserror for ergonomic error handling and maps failures to exit codes.

use std::path::PathBuf;
use thiserror::Error;

use crate::cloud::CloudError;
use crate::deploy::{DeployError, DeployErrorKind};
use crate::types::{EnvironmentNameError, ParseColorError};

/// Process exit codes, one per failure class so automation can branch on them.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const HEALTH_TIMEOUT: i32 = 3;
    pub const SWITCH: i32 = 4;
    pub const DISCOVERY: i32 = 5;
    pub const MANUAL_INTERVENTION: i32 = 10;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("no environment selected (use --env or FLEETSWAP_ENV)")]
    NoEnvironment,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("validation failed for {environment}: {failed} check(s) failed")]
    ValidationFailed { environment: String, failed: usize },

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("backend error: {0}")]
    Cloud(#[from] CloudError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<EnvironmentNameError> for Error {
    fn from(err: EnvironmentNameError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

impl From<ParseColorError> for Error {
    fn from(err: ParseColorError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

impl Error {
    /// Exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Deploy(e) => match e.kind() {
                DeployErrorKind::Config | DeployErrorKind::Capacity => exit_code::CONFIG,
                DeployErrorKind::HealthTimeout => exit_code::HEALTH_TIMEOUT,
                DeployErrorKind::Switch => exit_code::SWITCH,
                DeployErrorKind::Discovery => exit_code::DISCOVERY,
                DeployErrorKind::Interrupted => exit_code::INTERRUPTED,
                DeployErrorKind::ManualIntervention => exit_code::MANUAL_INTERVENTION,
                DeployErrorKind::Cancelled | DeployErrorKind::LeaseHeld | DeployErrorKind::Cloud => {
                    exit_code::FAILURE
                }
            },
            Error::AlreadyExists(_) | Error::Cloud(_) | Error::Io(_) => exit_code::FAILURE,
            Error::ConfigNotFound(_)
            | Error::UnknownEnvironment(_)
            | Error::NoEnvironment
            | Error::InvalidConfig(_)
            | Error::ValidationFailed { .. }
            | Error::Yaml(_) => exit_code::CONFIG,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::Phase;

    #[test]
    fn config_failures_exit_with_config_code() {
        assert_eq!(Error::NoEnvironment.exit_code(), exit_code::CONFIG);
        let err = Error::from(DeployError::config("state missing"));
        assert_eq!(err.exit_code(), exit_code::CONFIG);
    }

    #[test]
    fn manual_intervention_is_distinct_from_clean_interrupt() {
        let interrupted = DeployError::Interrupted {
            phase: Phase::Scaling,
        };
        let clean = Error::from(DeployError::Interrupted {
            phase: Phase::Scaling,
        });
        let stuck = Error::from(DeployError::ManualIntervention {
            cause: Box::new(interrupted),
            failures: vec!["restore blue: throttled".to_string()],
        });
        assert_eq!(clean.exit_code(), exit_code::INTERRUPTED);
        assert_eq!(stuck.exit_code(), exit_code::MANUAL_INTERVENTION);
    }
}
