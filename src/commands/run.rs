// ABOUTME: Run command implementation.
// ABOUTME: Resolves one target, dispatches one operation and streams its events.

use super::console::Console;
use super::with_events;
use dockside::diagnostics::Diagnostics;
use dockside::error::{Error, Result};
use dockside::events::EventSink;
use dockside::ops::{OperationContext, OperationHandler, dispatch};
use dockside::output::Output;
use dockside::pipeline::DeployOverrides;
use dockside::progress::format_bytes;
use dockside::types::Operation;
use std::sync::Arc;

/// Run `operation` against the target matching `query`.
pub async fn run(
    query: &str,
    operation: &str,
    overrides: DeployOverrides,
    profile: Option<&str>,
    mut output: Output,
) -> Result<()> {
    let operation: Operation = operation
        .parse()
        .map_err(|e: dockside::types::OperationParseError| Error::InvalidArgument(e.to_string()))?;

    output.start_timer();
    let mut diag = Diagnostics::default();
    let console = Console::open(profile, &output, &mut diag).await?;

    let result = run_on(&console, query, operation, overrides, &output, &mut diag).await;
    console.close(&mut diag).await;
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
    result
}

async fn run_on(
    console: &Console,
    query: &str,
    operation: Operation,
    overrides: DeployOverrides,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<()> {
    let snapshot = console.registry.refresh().await?;
    let target = snapshot.find(query)?;
    let target = snapshot.check(&target.id, &operation)?.id.clone();

    let (events, mut receiver) = EventSink::channel();
    let ctx = OperationContext::new(events).overrides(overrides);
    let cancel = ctx.cancel.clone();

    let handler: Arc<dyn OperationHandler> = console.handler.clone();
    let ticket = dispatch(handler, target, operation, ctx);
    let summary = with_events(&mut receiver, output, &cancel, ticket.wait()).await?;

    diag.cleanup(summary.warnings.iter().cloned());
    if let Some(text) = &summary.output {
        println!("{}", text.trim_end());
    }

    let mut message = format!("✓ {} {}", summary.operation, summary.target);
    if let Some(bytes) = summary.bytes_transferred {
        message.push_str(&format!(", {} transferred", format_bytes(bytes)));
    }
    if let Some(path) = &summary.local_path {
        message.push_str(&format!(", saved to {}", path.display()));
    }
    output.success(&message);
    Ok(())
}
