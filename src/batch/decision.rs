// ABOUTME: What to do after a batch operation fails.
// ABOUTME: The orchestrator asks a decider once per failure and never retries.

use super::OperationRecord;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Abort,
}

/// Chooses between continuing and aborting after a failed operation.
#[async_trait]
pub trait FailureDecider: Send {
    async fn decide(&mut self, failure: &OperationRecord) -> Decision;
}

/// Always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub Decision);

#[async_trait]
impl FailureDecider for FixedDecision {
    async fn decide(&mut self, _failure: &OperationRecord) -> Decision {
        self.0
    }
}
