// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines global flags, all subcommands, and their arguments.

use clap::{Args, Parser, Subcommand};
use fleetswap::types::{Color, EnvironmentName, Version};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "fleetswap")]
#[command(about = "Blue-green deployments for two-fleet cloud services")]
#[command(version)]
pub struct Cli {
    /// Environment to operate on (defined in config)
    #[arg(short, long, global = true, env = "FLEETSWAP_ENV")]
    pub env: Option<EnvironmentName>,

    /// Path to the config file (default: discovered in the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Answer yes to every confirmation prompt
    #[arg(long, global = true)]
    pub skip_confirmation: bool,

    /// Resolve state and print the plan without changing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Break a deploy lease held by another operator
    #[arg(long, global = true)]
    pub force_unlock: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a fleetswap.yml template and seed the simulated cloud
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the active color, capacity, and health of each fleet
    Status,

    /// Deploy a release to the inactive color and switch traffic to it
    Deploy(DeployArgs),

    /// Move traffic to a color that is already running
    Switch {
        /// Color to route to (blue/green or A/B)
        color: Color,
    },

    /// Move traffic back to the other color without scaling it up
    Rollback,

    /// Scale the inactive color to zero
    Cleanup {
        /// Color to scale down (default: the inactive one)
        #[arg(long)]
        color: Option<Color>,
    },

    /// Scale both colors to zero
    Shutdown,

    /// Check configuration against the cloud without changing anything
    Validate,
}

#[derive(Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct DeployArgs {
    #[command(subcommand)]
    pub action: Option<DeployAction>,

    /// Release to deploy (default: what the target color already runs)
    pub version: Option<Version>,

    /// Desired instance count (default: the active fleet's)
    #[arg(long)]
    pub capacity: Option<u32>,

    /// Color to deploy to (default: the inactive one)
    #[arg(long)]
    pub color: Option<Color>,

    /// Skip the readiness endpoint check
    #[arg(long)]
    pub skip_readiness_check: bool,

    /// How long to wait for the readiness endpoint (e.g. 15m)
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    pub readiness_timeout: Option<Duration>,

    /// Scale the former color to zero once traffic has moved
    #[arg(long)]
    pub scale_down_previous: bool,
}

#[derive(Subcommand)]
pub enum DeployAction {
    /// List releases in the catalog, newest first
    List {
        /// Only show releases built from this branch
        #[arg(short, long)]
        branch: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn deploy_accepts_version_and_flags() {
        let cli = Cli::try_parse_from([
            "fleetswap",
            "--env",
            "beta",
            "deploy",
            "v123",
            "--capacity",
            "3",
            "--readiness-timeout",
            "90s",
        ])
        .unwrap();
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert!(args.action.is_none());
        assert_eq!(args.version.unwrap().as_str(), "v123");
        assert_eq!(args.capacity, Some(3));
        assert_eq!(args.readiness_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn deploy_list_is_a_subcommand() {
        let cli = Cli::try_parse_from(["fleetswap", "deploy", "list", "--branch", "main"]).unwrap();
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert!(matches!(
            args.action,
            Some(DeployAction::List { branch: Some(ref b) }) if b == "main"
        ));
    }

    #[test]
    fn switch_accepts_letters() {
        let cli = Cli::try_parse_from(["fleetswap", "switch", "B", "--dry-run"]).unwrap();
        assert!(cli.dry_run);
        assert!(matches!(cli.command, Commands::Switch { color: Color::Green }));
    }

    #[test]
    fn environment_falls_back_to_variable() {
        temp_env::with_var("FLEETSWAP_ENV", Some("prod"), || {
            let cli = Cli::try_parse_from(["fleetswap", "status"]).unwrap();
            assert_eq!(cli.env.unwrap().as_str(), "prod");
        });
        temp_env::with_var("FLEETSWAP_ENV", Some("prod"), || {
            let cli = Cli::try_parse_from(["fleetswap", "--env", "beta", "status"]).unwrap();
            assert_eq!(cli.env.unwrap().as_str(), "beta");
        });
    }

    #[test]
    fn unknown_color_is_rejected() {
        assert!(Cli::try_parse_from(["fleetswap", "switch", "red"]).is_err());
    }
}
