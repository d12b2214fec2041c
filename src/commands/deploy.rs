// ABOUTME: Deploy command implementation.
// ABOUTME: Runs the blue-green deploy for one environment and lists releases.

use super::backend::Invocation;
use fleetswap::deploy::{DeployOutcome, DeployRequest};
use fleetswap::diagnostics::Diagnostics;
use fleetswap::error::Result;
use fleetswap::output::Output;

/// Deploy a release to the inactive color and move traffic to it.
pub async fn deploy(
    invocation: &Invocation,
    request: DeployRequest,
    output: &mut Output,
) -> Result<()> {
    output.start_timer();
    let orchestrator = invocation.connect(output)?;
    let mut diag = Diagnostics::default();

    output.progress(&format!(
        "Deploying {} to {}",
        request
            .version
            .as_ref()
            .map_or_else(|| "the current version".to_string(), ToString::to_string),
        orchestrator.environment()
    ));

    let outcome = orchestrator.deploy(&request).await?;
    if let DeployOutcome::Completed(report) = &outcome {
        diag.cleanup_steps(&report.warnings);
    }

    output.report(&outcome);
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
    match &outcome {
        DeployOutcome::Planned(_) => output.success("Dry run complete, nothing changed"),
        DeployOutcome::Completed(report) => {
            output.success(&format!("Deployment complete, {} is live", report.active))
        }
    }
    Ok(())
}

/// List releases in the catalog, marking what each color runs.
pub async fn list_releases(
    invocation: &Invocation,
    branch: Option<&str>,
    output: &Output,
) -> Result<()> {
    let orchestrator = invocation.connect(output)?;
    let listing = orchestrator.list_releases(branch).await?;
    output.report(&listing);
    Ok(())
}
