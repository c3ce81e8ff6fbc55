// ABOUTME: Operation dispatch: one entry point for every catalogue operation.
// ABOUTME: Each dispatch returns a ticket whose completion resolves exactly once.

mod error;
pub mod export;
mod handler;
mod ticket;

pub use error::OperationError;
pub use export::{ExportError, ExportOutcome};
pub use handler::ConsoleHandler;
pub use ticket::{OperationTicket, dispatch};

use crate::events::EventSink;
use crate::pipeline::DeployOverrides;
use crate::types::{Operation, TargetId};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-dispatch inputs besides the target and operation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub events: EventSink,
    pub cancel: CancellationToken,
    pub overrides: DeployOverrides,
    /// Stop a log follow after this long and count it as success.
    pub follow_window: Option<Duration>,
}

impl OperationContext {
    pub fn new(events: EventSink) -> Self {
        Self {
            events,
            cancel: CancellationToken::new(),
            overrides: DeployOverrides::default(),
            follow_window: None,
        }
    }

    pub fn overrides(mut self, overrides: DeployOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn follow_window(mut self, window: Duration) -> Self {
        self.follow_window = Some(window);
        self
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// What a successful operation produced.
#[derive(Debug, Clone)]
pub struct OperationSummary {
    pub target: TargetId,
    pub operation: Operation,
    pub duration: Duration,
    /// Command output worth showing, such as `inspect` JSON.
    pub output: Option<String>,
    pub bytes_transferred: Option<u64>,
    /// File written locally, for exports.
    pub local_path: Option<PathBuf>,
    pub warnings: Vec<String>,
}

impl OperationSummary {
    pub fn new(target: TargetId, operation: Operation, duration: Duration) -> Self {
        Self {
            target,
            operation,
            duration,
            output: None,
            bytes_transferred: None,
            local_path: None,
            warnings: Vec::new(),
        }
    }
}

/// Carries out operations against targets.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn execute(
        &self,
        target: &TargetId,
        operation: &Operation,
        ctx: &OperationContext,
    ) -> Result<OperationSummary, OperationError>;
}
