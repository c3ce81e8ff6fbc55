// ABOUTME: Sequential batch execution over an ordered plan of targets and operations.
// ABOUTME: Produces one outcome record per planned operation; nothing is rolled back.

mod decision;
mod orchestrator;
mod plan;

pub use decision::{Decision, FailureDecider, FixedDecision};
pub use orchestrator::BatchOrchestrator;
pub use plan::{BatchPlan, PlanEntry, PlanStep};

use crate::error::ErrorKind;
use crate::types::{Operation, TargetId};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded {
        #[serde(with = "humantime_serde")]
        duration: Duration,
        #[serde(skip_serializing_if = "Option::is_none")]
        bytes_transferred: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        local_path: Option<PathBuf>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Failed {
        kind: ErrorKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stderr: Option<String>,
    },
    Skipped {
        reason: String,
    },
}

/// Result of one planned operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    /// Target as written in the plan.
    pub target: TargetId,
    #[serde(serialize_with = "serialize_display")]
    pub operation: Operation,
    #[serde(flatten)]
    pub outcome: Outcome,
}

fn serialize_display<S: serde::Serializer>(
    operation: &Operation,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(operation)
}

impl OperationRecord {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub records: Vec<OperationRecord>,
    /// An operator (or the decider) stopped the batch early.
    pub aborted: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}
