// ABOUTME: Error types for fleet capacity operations.
// ABOUTME: Separates bad capacity requests from collaborator failures.

use crate::cloud::CloudError;
use crate::types::Color;

/// A capacity request that cannot be honored. Nothing is mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("requested {field} {requested} exceeds the capacity ceiling of {ceiling}")]
    ExceedsCeiling {
        field: &'static str,
        requested: u32,
        ceiling: u32,
    },

    #[error("inconsistent capacity request: {0}")]
    Inconsistent(String),

    #[error("desired capacity for {color} must be at least 1")]
    Empty { color: Color },
}

#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("{operation} on {color} fleet failed: {source}")]
    Cloud {
        operation: &'static str,
        color: Color,
        #[source]
        source: CloudError,
    },
}
