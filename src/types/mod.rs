// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod color;
mod environment_name;
mod id;
mod version;

pub use color::{Color, ParseColorError};
pub use environment_name::{EnvironmentName, EnvironmentNameError};
pub use id::{FleetId, Id, InstanceId, ListenerId, RuleId, TargetId};
pub use version::{Version, VersionError};
