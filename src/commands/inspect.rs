// ABOUTME: Status and validate command implementations.
// ABOUTME: Read-only views of one environment; validate fails on any failed check.

use super::backend::Invocation;
use fleetswap::diagnostics::Diagnostics;
use fleetswap::error::{Error, Result};
use fleetswap::output::Output;

pub async fn status(invocation: &Invocation, output: &Output) -> Result<()> {
    let orchestrator = invocation.connect(output)?;
    let report = orchestrator.status().await?;

    let mut diag = Diagnostics::default();
    diag.inspect_status(&report);

    output.report(&report);
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
    Ok(())
}

pub async fn validate(invocation: &Invocation, output: &Output) -> Result<()> {
    let orchestrator = invocation.connect(output)?;
    let report = orchestrator.validate().await?;
    output.report(&report);

    if report.is_valid() {
        output.success(&format!("{} is consistent", report.environment));
        Ok(())
    } else {
        Err(Error::ValidationFailed {
            environment: report.environment.to_string(),
            failed: report.failed(),
        })
    }
}
