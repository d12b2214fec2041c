// ABOUTME: Entry point for the fleetswap CLI application.
// ABOUTME: Parses arguments, installs signal handling, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, DeployAction};
use commands::Invocation;
use fleetswap::config::Config;
use fleetswap::deploy::{CommandOptions, DeployRequest};
use fleetswap::error::Result;
use fleetswap::output::{Output, OutputMode};
use fleetswap::signal::SignalGuard;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));
    let result = run(cli, &mut output).await;

    if let Err(e) = result {
        output.error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<()> {
    let cwd = env::current_dir()?;

    if let Commands::Init { force } = cli.command {
        return commands::init(&cwd, force, output);
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&cwd)?,
    };
    let signals = SignalGuard::install();
    let invocation = Invocation {
        config,
        env: cli.env,
        options: CommandOptions {
            skip_confirmation: cli.skip_confirmation,
            dry_run: cli.dry_run,
            force_unlock: cli.force_unlock,
        },
        interrupt: signals.interrupt(),
    };

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Status => commands::status(&invocation, output).await,
        Commands::Validate => commands::validate(&invocation, output).await,
        Commands::Deploy(args) => match args.action {
            Some(DeployAction::List { branch }) => {
                commands::list_releases(&invocation, branch.as_deref(), output).await
            }
            None => {
                let request = DeployRequest {
                    target: args.color,
                    capacity: args.capacity,
                    version: args.version,
                    skip_confirmation: cli.skip_confirmation,
                    skip_readiness_check: args.skip_readiness_check,
                    readiness_timeout: args.readiness_timeout,
                    dry_run: cli.dry_run,
                    scale_down_previous: args.scale_down_previous,
                    force_unlock: cli.force_unlock,
                };
                commands::deploy(&invocation, request, output).await
            }
        },
        Commands::Switch { color } => commands::switch(&invocation, color, output).await,
        Commands::Rollback => commands::rollback(&invocation, output).await,
        Commands::Cleanup { color } => commands::cleanup(&invocation, color, output).await,
        Commands::Shutdown => commands::shutdown(&invocation, output).await,
    }
}
