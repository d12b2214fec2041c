// ABOUTME: Collaborator error types with SNAFU pattern.
// ABOUTME: Unifies scaling, load balancer, and state store failures for programmatic handling.

use snafu::Snafu;
use std::path::PathBuf;

/// Failure reported by one of the external collaborators.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CloudError {
    #[snafu(display("fleet not found: {fleet}"))]
    FleetNotFound { fleet: String },

    #[snafu(display("listener not found: {listener}"))]
    ListenerNotFound { listener: String },

    #[snafu(display("routing rule not found: {rule}"))]
    RuleNotFound { rule: String },

    #[snafu(display("routing target not found: {target}"))]
    TargetNotFound { target: String },

    #[snafu(display("release not found: {version}"))]
    ReleaseNotFound { version: String },

    #[snafu(display("{operation} rejected: {message}"))]
    Rejected { operation: String, message: String },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("malformed cloud document {}: {source}", path.display()))]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("failed to encode cloud document: {source}"))]
    Encode { source: serde_json::Error },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudErrorKind {
    /// A named resource does not exist.
    NotFound,
    /// The API refused the request.
    Rejected,
    /// The backing storage could not be read or written.
    Storage,
}

impl CloudError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> CloudErrorKind {
        match self {
            CloudError::FleetNotFound { .. }
            | CloudError::ListenerNotFound { .. }
            | CloudError::RuleNotFound { .. }
            | CloudError::TargetNotFound { .. }
            | CloudError::ReleaseNotFound { .. } => CloudErrorKind::NotFound,
            CloudError::Rejected { .. } => CloudErrorKind::Rejected,
            CloudError::Read { .. }
            | CloudError::Write { .. }
            | CloudError::Decode { .. }
            | CloudError::Encode { .. } => CloudErrorKind::Storage,
        }
    }

    pub(crate) fn rejected(operation: &str, message: impl Into<String>) -> Self {
        CloudError::Rejected {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}
