// ABOUTME: Switch and rollback command implementations.
// ABOUTME: Moves traffic between already-running colors without scaling either up.

use super::backend::Invocation;
use fleetswap::deploy::SwitchReport;
use fleetswap::diagnostics::Diagnostics;
use fleetswap::error::Result;
use fleetswap::output::Output;
use fleetswap::types::Color;

/// Route traffic to `color`.
pub async fn switch(invocation: &Invocation, color: Color, output: &mut Output) -> Result<()> {
    output.start_timer();
    let orchestrator = invocation.connect(output)?;
    output.progress(&format!(
        "Switching {} to {color}",
        orchestrator.environment()
    ));
    let report = orchestrator.switch(color, invocation.options).await?;
    finish(report, output, "Switch complete!");
    Ok(())
}

/// Route traffic back to the other color.
pub async fn rollback(invocation: &Invocation, output: &mut Output) -> Result<()> {
    output.start_timer();
    let orchestrator = invocation.connect(output)?;
    output.progress(&format!(
        "Rolling back {} to the other color",
        orchestrator.environment()
    ));
    let report = orchestrator.rollback(invocation.options).await?;
    finish(report, output, "Rollback complete!");
    Ok(())
}

fn finish(report: SwitchReport, output: &Output, done: &str) {
    let mut diag = Diagnostics::default();
    diag.cleanup_steps(&report.warnings);

    output.report(&report);
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
    if report.changed && !report.dry_run {
        output.success(done);
    }
}
