// ABOUTME: Build, package, transfer and activate pipelines for one target.
// ABOUTME: Stages are enforced with type-state markers; observers see PipelineStage events.

mod activation;
mod error;
mod job;
mod jobs;
mod package;
mod runner;
mod scratch;
mod stage;
mod transitions;

pub use activation::{ActivationVars, render as render_activation, unexpected_stderr};
pub use error::{PipelineError, Result};
pub use job::{BuildStep, DeployOverrides, PipelineJob};
pub use jobs::{JobGuard, JobRegistry};
pub use package::package_directory;
pub use runner::{PipelineFailure, PipelineReport, PipelineRunner};
pub use scratch::Scratch;
pub use stage::{
    Activated, Built, Finishable, Idle, Packaged, PipelineStage, ReadyToPackage, Transferred,
};
pub use transitions::{Pipeline, TransitionResult};
