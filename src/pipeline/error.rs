// ABOUTME: Error types for pipeline stages.
// ABOUTME: Every terminal failure keeps the captured exit code and stderr.

use crate::error::ErrorKind;
use crate::types::{Environment, TargetId};
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A pipeline for the same target and environment is still running.
    #[error("a pipeline for {target}/{environment} has been running since {since}")]
    JobInProgress {
        target: TargetId,
        environment: Environment,
        since: DateTime<Utc>,
    },

    /// The remote build exited non-zero.
    #[error("build failed with exit code {exit_code}: {}", stderr.trim())]
    BuildFailed { exit_code: u32, stderr: String },

    /// The local directory could not be archived.
    #[error("failed to package {path}: {reason}")]
    PackagingFailed { path: String, reason: String },

    /// Pushing the archive to the host failed.
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// The activation command failed or wrote unexpected stderr.
    #[error("activation failed with exit code {exit_code}: {}", stderr.trim())]
    ActivationFailed { exit_code: u32, stderr: String },

    #[error(transparent)]
    Remote(#[from] crate::ssh::Error),

    #[error("pipeline cancelled")]
    Cancelled,

    /// Neither overrides, last-used settings, nor config supplied a value.
    #[error("no {what} configured for {target}/{environment}")]
    MissingSettings {
        what: &'static str,
        target: TargetId,
        environment: Environment,
    },

    #[error("{0} is not a pipeline operation")]
    NotAPipeline(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::JobInProgress { .. } => ErrorKind::JobInProgress,
            PipelineError::BuildFailed { .. } | PipelineError::ActivationFailed { .. } => {
                ErrorKind::Remote
            }
            PipelineError::PackagingFailed { .. } | PipelineError::TransferFailed(_) => {
                ErrorKind::Transfer
            }
            PipelineError::Remote(e) => e.kind(),
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::MissingSettings { .. }
            | PipelineError::NotAPipeline(_)
            | PipelineError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled)
    }

    /// Stderr captured from the remote step that failed.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            PipelineError::BuildFailed { stderr, .. }
            | PipelineError::ActivationFailed { stderr, .. } => Some(stderr),
            PipelineError::Remote(crate::ssh::Error::Remote { stderr, .. }) => Some(stderr),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
