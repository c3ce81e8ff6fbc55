// ABOUTME: Pipeline stages: the runtime enum reported in events and the type-state markers.
// ABOUTME: Markers carry the data each stage produced so later stages cannot run early.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Where a pipeline is, as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Building,
    Packaging,
    Transferring,
    Activating,
    Success,
    Failure,
    Cancelled,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStage::Success | PipelineStage::Failure | PipelineStage::Cancelled
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Building => "building",
            PipelineStage::Packaging => "packaging",
            PipelineStage::Transferring => "transferring",
            PipelineStage::Activating => "activating",
            PipelineStage::Success => "success",
            PipelineStage::Failure => "failure",
            PipelineStage::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Job claimed, nothing run yet.
/// Available actions: `build()`, `package()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Idle;

/// Remote build succeeded.
/// Available actions: `package()`, `finish()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Built;

/// Local directory archived into the scratch directory.
/// Available actions: `transfer()`
#[derive(Debug, Clone)]
pub struct Packaged {
    pub archive: PathBuf,
    pub size: u64,
}

/// Archive present on the host.
/// Available actions: `activate()`
#[derive(Debug, Clone)]
pub struct Transferred {
    pub remote_archive: String,
    pub bytes: u64,
}

/// Activation command succeeded.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Activated {
    pub bytes: u64,
}

pub(crate) mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Idle {}
    impl Sealed for super::Built {}
    impl Sealed for super::Activated {}
}

/// States from which packaging may start.
pub trait ReadyToPackage: sealed::Sealed {}
impl ReadyToPackage for Idle {}
impl ReadyToPackage for Built {}

/// States that may end a pipeline successfully.
pub trait Finishable: sealed::Sealed {
    fn bytes_transferred(&self) -> Option<u64>;
}

impl Finishable for Built {
    fn bytes_transferred(&self) -> Option<u64> {
        None
    }
}

impl Finishable for Activated {
    fn bytes_transferred(&self) -> Option<u64> {
        Some(self.bytes)
    }
}
