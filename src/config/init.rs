// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a fleetswap.yml template with a rule-routed and a listener-routed environment.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

const TEMPLATE: &str = r#"backend:
  provider: simulated
  path: .fleetswap/cloud.json

health:
  poll_interval: 5s
  fleet_timeout: 10m
  routing_timeout: 10m
  readiness_timeout: 15m

environments:
  beta:
    capacity_ceiling: 4
    routing:
      mode: rule
      rule: beta-path-rule
    blue:
      fleet: beta-blue
      target: tg-beta-blue
    green:
      fleet: beta-green
      target: tg-beta-green

  prod:
    capacity_ceiling: 24
    autoscaling: true
    # Traffic only moves once a discovery artifact exists for the version.
    readiness_required: true
    discovery_source: beta
    routing:
      mode: default-action
      listeners:
        - prod-http
        - prod-https
    blue:
      fleet: prod-blue
      target: tg-prod-blue
    green:
      fleet: prod-green
      target: tg-prod-green
"#;

/// Write the template config into `dir` and return the parsed result.
pub fn init_config(dir: &Path, force: bool) -> Result<(PathBuf, Config)> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::from_yaml(TEMPLATE)?;
    config.base_dir = dir.to_path_buf();
    std::fs::write(&config_path, TEMPLATE)?;

    Ok((config_path, config))
}
