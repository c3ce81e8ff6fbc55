// ABOUTME: Spawned operations and their completion tickets.
// ABOUTME: Callers await the ticket instead of polling for the operation to finish.

use super::{OperationContext, OperationError, OperationHandler, OperationSummary};
use crate::types::{Operation, TargetId};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to an operation running in the background.
#[derive(Debug)]
pub struct OperationTicket {
    target: TargetId,
    operation: Operation,
    cancel: CancellationToken,
    rx: oneshot::Receiver<Result<OperationSummary, OperationError>>,
}

impl OperationTicket {
    pub fn target(&self) -> &TargetId {
        &self.target
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Ask the operation to stop. It still resolves through `wait`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the operation's single completion signal.
    pub async fn wait(self) -> Result<OperationSummary, OperationError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(OperationError::Abandoned {
                target: self.target,
                operation: self.operation.to_string(),
            }),
        }
    }
}

/// Start `operation` on `target` in a background task.
pub fn dispatch(
    handler: Arc<dyn OperationHandler>,
    target: TargetId,
    operation: Operation,
    ctx: OperationContext,
) -> OperationTicket {
    let (tx, rx) = oneshot::channel();
    let cancel = ctx.cancel.clone();
    let task_target = target.clone();
    let task_operation = operation.clone();

    tokio::spawn(async move {
        ctx.events.started(&task_target, &task_operation);
        let result = handler.execute(&task_target, &task_operation, &ctx).await;
        ctx.events
            .finished(&task_target, &task_operation, result.is_ok());
        if tx.send(result).is_err() {
            debug!(target_id = %task_target, "Operation result dropped; ticket was discarded");
        }
    });

    OperationTicket {
        target,
        operation,
        cancel,
        rx,
    }
}
