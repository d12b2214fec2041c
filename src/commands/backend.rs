// ABOUTME: Shared helper for binding a command to one environment of the simulated cloud.
// ABOUTME: Resolves the environment, opens the cloud document, and builds the orchestrator.

use fleetswap::cloud::{Collaborators, SimulatedCloud};
use fleetswap::config::Config;
use fleetswap::deploy::{CommandOptions, Orchestrator};
use fleetswap::error::{Error, Result};
use fleetswap::output::Output;
use fleetswap::prompt::TerminalPrompt;
use fleetswap::signal::Interrupt;
use fleetswap::types::EnvironmentName;
use std::sync::Arc;

/// Everything a command needs beyond its own arguments.
pub struct Invocation {
    pub config: Config,
    pub env: Option<EnvironmentName>,
    pub options: CommandOptions,
    pub interrupt: Interrupt,
}

impl Invocation {
    /// The selected environment, or the only one configured.
    fn environment(&self) -> Result<EnvironmentName> {
        if let Some(name) = &self.env {
            self.config.environment(name)?;
            return Ok(name.clone());
        }
        let mut names = self.config.environments.keys();
        match (names.next(), names.next()) {
            (Some(only), None) => Ok(only.clone()),
            _ => Err(Error::NoEnvironment),
        }
    }

    /// Open the backend and bind an orchestrator to the selected environment.
    pub fn connect(&self, output: &Output) -> Result<Orchestrator> {
        let name = self.environment()?;
        let env = self.config.environment(&name)?.clone();
        let timings = self.config.health_for(&name)?;

        let path = self.config.document_path();
        output.progress(&format!("  → Opening simulated cloud at {}", path.display()));
        let cloud = Arc::new(SimulatedCloud::open(&path)?);

        Ok(
            Orchestrator::new(name, env, timings, Collaborators::simulated(cloud))
                .with_confirmation(Arc::new(TerminalPrompt))
                .with_interrupt(self.interrupt.clone()),
        )
    }
}
