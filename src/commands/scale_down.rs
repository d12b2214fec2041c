// ABOUTME: Cleanup and shutdown command implementations.
// ABOUTME: Scales the inactive color, or both colors, to zero.

use super::backend::Invocation;
use fleetswap::error::Result;
use fleetswap::output::Output;
use fleetswap::types::Color;

/// Scale an inactive color to zero.
pub async fn cleanup(
    invocation: &Invocation,
    color: Option<Color>,
    output: &mut Output,
) -> Result<()> {
    output.start_timer();
    let orchestrator = invocation.connect(output)?;
    let report = orchestrator.cleanup(color, invocation.options).await?;
    output.report(&report);
    if !report.dry_run {
        output.success("Cleanup complete!");
    }
    Ok(())
}

/// Scale both colors to zero. The service goes offline.
pub async fn shutdown(invocation: &Invocation, output: &mut Output) -> Result<()> {
    output.start_timer();
    let orchestrator = invocation.connect(output)?;
    let report = orchestrator.shutdown(invocation.options).await?;
    output.report(&report);
    if !report.dry_run {
        output.success("Shutdown complete!");
    }
    Ok(())
}
