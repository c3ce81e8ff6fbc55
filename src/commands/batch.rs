// ABOUTME: Batch command implementation.
// ABOUTME: Runs a plan file sequentially and asks the operator what to do after failures.

use super::console::Console;
use super::with_events;
use crate::cli::OnFailure;
use async_trait::async_trait;
use dockside::batch::{
    BatchOrchestrator, BatchPlan, Decision, FailureDecider, FixedDecision, OperationRecord,
    Outcome,
};
use dockside::diagnostics::Diagnostics;
use dockside::error::{Error, Result};
use dockside::events::EventSink;
use dockside::ops::OperationHandler;
use dockside::output::Output;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub async fn batch(
    plan_path: &Path,
    on_failure: OnFailure,
    profile: Option<&str>,
    mut output: Output,
) -> Result<()> {
    let plan = BatchPlan::load(plan_path)?;
    output.start_timer();
    output.progress(&format!("Running {} operation(s) from {}", plan.len(), plan_path.display()));

    let mut diag = Diagnostics::default();
    let console = Console::open(profile, &output, &mut diag).await?;

    let (events, mut receiver) = EventSink::channel();
    let handler: Arc<dyn OperationHandler> = console.handler.clone();
    let orchestrator = BatchOrchestrator::new(
        Arc::clone(&console.registry),
        handler,
        events,
        console.config.logs.batch_window,
    );

    let mut decider: Box<dyn FailureDecider> = match on_failure {
        OnFailure::Prompt => Box::new(PromptDecider::new()),
        OnFailure::Continue => Box::new(FixedDecision(Decision::Continue)),
        OnFailure::Abort => Box::new(FixedDecision(Decision::Abort)),
    };

    let cancel = CancellationToken::new();
    let report = with_events(
        &mut receiver,
        &output,
        &cancel,
        orchestrator.run(&plan, decider.as_mut(), &cancel),
    )
    .await;
    drop(orchestrator);
    console.close(&mut diag).await;

    for record in &report.records {
        if let Outcome::Succeeded { warnings, .. } = &record.outcome {
            diag.cleanup(warnings.iter().cloned());
        }
    }
    output.batch_report(&report);
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    let failed = report.failed();
    if report.aborted {
        Err(Error::BatchAborted { failed })
    } else if failed > 0 {
        Err(Error::BatchFailed { failed })
    } else {
        output.success("Batch complete");
        Ok(())
    }
}

/// Asks on the terminal whether to keep going after a failure.
struct PromptDecider {
    stdin: BufReader<tokio::io::Stdin>,
}

impl PromptDecider {
    fn new() -> Self {
        Self {
            stdin: BufReader::new(tokio::io::stdin()),
        }
    }
}

#[async_trait]
impl FailureDecider for PromptDecider {
    async fn decide(&mut self, record: &OperationRecord) -> Decision {
        if let Outcome::Failed {
            message, stderr, ..
        } = &record.outcome
        {
            eprintln!("✗ {} on {} failed: {message}", record.operation, record.target);
            if let Some(stderr) = stderr.as_deref().filter(|s| !s.trim().is_empty()) {
                eprintln!("{}", stderr.trim_end());
            }
        }
        eprint!("Continue with the remaining operations? [y/N] ");

        let mut answer = String::new();
        match self.stdin.read_line(&mut answer).await {
            Ok(_) => parse_answer(&answer),
            Err(e) => {
                warn!("failed to read answer, aborting: {}", e);
                Decision::Abort
            }
        }
    }
}

fn parse_answer(answer: &str) -> Decision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Decision::Continue,
        _ => Decision::Abort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_continues() {
        assert_eq!(parse_answer("y\n"), Decision::Continue);
        assert_eq!(parse_answer(" YES "), Decision::Continue);
        assert_eq!(parse_answer("\n"), Decision::Abort);
        assert_eq!(parse_answer("no"), Decision::Abort);
    }
}
