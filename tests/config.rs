// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, duration formats, environment lookup, and file discovery.

use fleetswap::config::*;
use fleetswap::error::Error;
use fleetswap::types::{Color, EnvironmentName, TargetId};
use std::fs;
use std::time::Duration;

const CONFIG: &str = r#"
health:
  poll_interval: 2s
  fleet_timeout: 5m

environments:
  beta:
    capacity_ceiling: 4
    routing:
      mode: rule
      rule: beta-rule
    blue:
      fleet: beta-blue
      target: tg-beta-blue
    green:
      fleet: beta-green
      target: tg-beta-green

  prod:
    capacity_ceiling: 20
    autoscaling: true
    readiness_required: true
    discovery_source: beta
    readiness:
      url: http://capabilities.internal/v1/list
      min_count: 40
    routing:
      mode: default-action
      listeners: [prod-http, prod-https]
    blue:
      fleet: prod-blue
      target: tg-prod-blue
    green:
      fleet: prod-green
      target: tg-prod-green
    health:
      poll_interval: 10s
      readiness_timeout: 30m
"#;

fn env(name: &str) -> EnvironmentName {
    EnvironmentName::new(name).unwrap()
}

mod parsing {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = Config::from_yaml(CONFIG).unwrap();

        assert_eq!(config.environments.len(), 2);
        assert_eq!(config.backend, BackendConfig::default());
        assert_eq!(config.health.poll_interval, Duration::from_secs(2));
        assert_eq!(config.health.fleet_timeout, Duration::from_secs(300));
        // Unset timings keep their defaults.
        assert_eq!(config.health.routing_timeout, Duration::from_secs(600));

        let prod = config.environment(&env("prod")).unwrap();
        assert!(prod.autoscaling);
        assert!(prod.readiness_required);
        assert_eq!(prod.discovery_source, Some(env("beta")));
        assert_eq!(prod.readiness.as_ref().unwrap().min_count, 40);
        let RoutingConfig::DefaultAction { listeners } = &prod.routing else {
            panic!("prod routes by listener default action");
        };
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn environment_health_overrides_global() {
        let config = Config::from_yaml(CONFIG).unwrap();

        let prod = config.health_for(&env("prod")).unwrap();
        assert_eq!(prod.poll_interval, Duration::from_secs(10));
        assert_eq!(prod.readiness_timeout, Duration::from_secs(30 * 60));

        let beta = config.health_for(&env("beta")).unwrap();
        assert_eq!(beta.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn color_lookup_by_target() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let beta = config.environment(&env("beta")).unwrap();

        assert_eq!(
            beta.color_of_target(&TargetId::new("tg-beta-green")),
            Some(Color::Green)
        );
        assert_eq!(beta.color_of_target(&TargetId::new("tg-other")), None);
        assert_eq!(beta.color(Color::Blue).target, TargetId::new("tg-beta-blue"));
    }

    #[test]
    fn unknown_environment_is_reported() {
        let config = Config::from_yaml(CONFIG).unwrap();

        let err = config.environment(&env("staging")).unwrap_err();
        assert!(matches!(err, Error::UnknownEnvironment(ref name) if name == "staging"));
    }
}

mod validation {
    use super::*;

    #[test]
    fn empty_listener_list_is_rejected() {
        let yaml = CONFIG.replace("[prod-http, prod-https]", "[]");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn shared_fleet_between_colors_is_rejected() {
        let yaml = CONFIG.replace("fleet: beta-green", "fleet: beta-blue");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let yaml = CONFIG.replace("capacity_ceiling: 4", "capacity_ceiling: 0");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn empty_environment_map_is_rejected() {
        assert!(Config::from_yaml("environments: {}\n").is_err());
    }

    #[test]
    fn bad_duration_is_rejected() {
        let yaml = CONFIG.replace("poll_interval: 2s", "poll_interval: soon");
        assert!(Config::from_yaml(&yaml).is_err());
    }
}

mod discovery {
    use super::*;

    #[test]
    fn discovers_config_in_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".fleetswap")).unwrap();
        fs::write(dir.path().join(".fleetswap/config.yml"), CONFIG).unwrap();

        let config = Config::discover(dir.path()).unwrap();

        assert_eq!(config.base_dir, dir.path());
        assert_eq!(
            config.document_path(),
            dir.path().join(".fleetswap/cloud.json")
        );
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();

        assert!(matches!(
            init_config(dir.path(), false),
            Err(Error::AlreadyExists(_))
        ));
        assert!(init_config(dir.path(), true).is_ok());
    }
}
