// ABOUTME: Health verification timing configuration.
// ABOUTME: Poll interval and per-phase timeouts with sensible defaults.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_phase_timeout", with = "humantime_serde")]
    pub fleet_timeout: Duration,

    #[serde(default = "default_phase_timeout", with = "humantime_serde")]
    pub routing_timeout: Duration,

    #[serde(default = "default_readiness_timeout", with = "humantime_serde")]
    pub readiness_timeout: Duration,

    /// Upper bound on abort cleanup after a failure or interrupt.
    #[serde(default = "default_cleanup_timeout", with = "humantime_serde")]
    pub cleanup_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_phase_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_readiness_timeout() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_cleanup_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            poll_interval: default_poll_interval(),
            fleet_timeout: default_phase_timeout(),
            routing_timeout: default_phase_timeout(),
            readiness_timeout: default_readiness_timeout(),
            cleanup_timeout: default_cleanup_timeout(),
        }
    }
}
