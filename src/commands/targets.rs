// ABOUTME: Targets command implementation.
// ABOUTME: Refreshes the registry once and prints every listed container.

use super::console::Console;
use dockside::diagnostics::{Diagnostics, Warning};
use dockside::error::Result;
use dockside::output::Output;

/// List the containers on the profile's host.
pub async fn targets(profile: Option<&str>, output: Output) -> Result<()> {
    let mut diag = Diagnostics::default();
    let console = Console::open(profile, &output, &mut diag).await?;

    let result = console.registry.refresh().await;
    console.close(&mut diag).await;
    let snapshot = result?;

    if snapshot.skipped() > 0 {
        diag.warn(Warning::skipped_targets(snapshot.skipped()));
    }
    output.targets(&snapshot);
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
    Ok(())
}
