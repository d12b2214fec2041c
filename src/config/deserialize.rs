// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Enforces non-empty listener and environment collections with readable errors.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::EnvironmentConfig;
use crate::types::{EnvironmentName, ListenerId};

pub fn deserialize_listeners<'de, D>(deserializer: D) -> Result<NonEmpty<ListenerId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<ListenerId> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one listener is required"))
}

pub fn deserialize_environments<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<EnvironmentName, EnvironmentConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let environments: BTreeMap<EnvironmentName, EnvironmentConfig> =
        BTreeMap::deserialize(deserializer)?;
    if environments.is_empty() {
        return Err(serde::de::Error::custom(
            "at least one environment is required",
        ));
    }
    for (name, env) in &environments {
        env.validate()
            .map_err(|reason| serde::de::Error::custom(format!("environment {name}: {reason}")))?;
    }
    Ok(environments)
}
