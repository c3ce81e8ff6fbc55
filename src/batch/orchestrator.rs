// ABOUTME: Runs a batch plan one operation at a time, awaiting each completion.
// ABOUTME: Eligibility is re-checked against a fresh snapshot before every dispatch.

use super::decision::{Decision, FailureDecider};
use super::plan::{BatchPlan, PlanStep};
use super::{BatchReport, OperationRecord, Outcome};
use crate::error::ErrorKind;
use crate::events::EventSink;
use crate::ops::{OperationContext, OperationHandler, dispatch};
use crate::registry::TargetRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct BatchOrchestrator {
    registry: Arc<TargetRegistry>,
    handler: Arc<dyn OperationHandler>,
    events: EventSink,
    follow_window: Duration,
}

impl BatchOrchestrator {
    pub fn new(
        registry: Arc<TargetRegistry>,
        handler: Arc<dyn OperationHandler>,
        events: EventSink,
        follow_window: Duration,
    ) -> Self {
        Self {
            registry,
            handler,
            events,
            follow_window,
        }
    }

    /// Execute `plan` in order.
    ///
    /// After a failure the decider chooses whether to continue; aborting (or
    /// cancelling `cancel`) records every remaining operation as skipped.
    pub async fn run(
        &self,
        plan: &BatchPlan,
        decider: &mut dyn FailureDecider,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let total = plan.len();

        for (index, step) in plan.ordered().enumerate() {
            if report.aborted || cancel.is_cancelled() {
                let reason = if report.aborted {
                    "batch aborted"
                } else {
                    "batch cancelled"
                };
                report.records.push(skipped(&step, reason));
                continue;
            }

            info!(
                step = index + 1,
                total,
                target_id = %step.entry.target,
                operation = %step.operation,
                "Dispatching"
            );
            let record = self.execute(&step, cancel).await;

            if record.is_failure() {
                warn!(target_id = %record.target, operation = %record.operation, "Operation failed");
                if decider.decide(&record).await == Decision::Abort {
                    report.aborted = true;
                }
            }
            report.records.push(record);
        }

        report
    }

    async fn execute(&self, step: &PlanStep<'_>, cancel: &CancellationToken) -> OperationRecord {
        let record = |outcome| OperationRecord {
            target: step.entry.target.clone(),
            operation: step.operation.clone(),
            outcome,
        };

        let snapshot = match self.registry.refresh().await {
            Ok(snapshot) => snapshot,
            Err(e) => return record(failed(e.kind(), e.to_string(), None)),
        };

        let target = match snapshot
            .find(step.entry.target.as_str())
            .and_then(|t| snapshot.check(&t.id, step.operation))
        {
            Ok(target) => target.id.clone(),
            Err(e) => return record(failed(e.kind(), e.to_string(), None)),
        };

        let ctx = OperationContext::new(self.events.clone())
            .cancel_token(cancel.child_token())
            .overrides(step.entry.overrides_for(step.operation))
            .follow_window(self.follow_window);

        let ticket = dispatch(
            Arc::clone(&self.handler),
            target,
            step.operation.clone(),
            ctx,
        );

        match ticket.wait().await {
            Ok(summary) => record(Outcome::Succeeded {
                duration: summary.duration,
                bytes_transferred: summary.bytes_transferred,
                local_path: summary.local_path,
                warnings: summary.warnings,
            }),
            Err(e) => record(failed(
                e.kind(),
                e.to_string(),
                e.stderr().map(str::to_string),
            )),
        }
    }
}

fn failed(kind: ErrorKind, message: String, stderr: Option<String>) -> Outcome {
    Outcome::Failed {
        kind,
        message,
        stderr,
    }
}

fn skipped(step: &PlanStep<'_>, reason: &str) -> OperationRecord {
    OperationRecord {
        target: step.entry.target.clone(),
        operation: step.operation.clone(),
        outcome: Outcome::Skipped {
            reason: reason.to_string(),
        },
    }
}
