// ABOUTME: Operation dispatch errors with SNAFU context selectors.
// ABOUTME: Each variant names the target and operation it came from.

use snafu::Snafu;

use super::export::ExportError;
use crate::error::ErrorKind;
use crate::pipeline::PipelineFailure;
use crate::types::TargetId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum OperationError {
    #[snafu(display("{operation} on {target} failed: {source}"))]
    Remote {
        target: TargetId,
        operation: String,
        source: crate::ssh::Error,
    },

    #[snafu(display("{operation} on {target} exited with code {exit_code}: {}", stderr.trim()))]
    CommandFailed {
        target: TargetId,
        operation: String,
        exit_code: u32,
        stderr: String,
    },

    #[snafu(display("{operation} on {target} failed: {source}"))]
    Pipeline {
        target: TargetId,
        operation: String,
        source: PipelineFailure,
    },

    #[snafu(display("export of {database} from {target} failed: {source}"))]
    Export {
        target: TargetId,
        database: String,
        source: ExportError,
    },

    #[snafu(display("{operation} on {target} was cancelled"))]
    Cancelled { target: TargetId, operation: String },

    #[snafu(display("{operation} on {target} stopped without reporting a result"))]
    Abandoned { target: TargetId, operation: String },
}

impl OperationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::Remote { source, .. } => source.kind(),
            OperationError::CommandFailed { .. } => ErrorKind::Remote,
            OperationError::Pipeline { source, .. } => source.error.kind(),
            OperationError::Export { source, .. } => source.kind(),
            OperationError::Cancelled { .. } => ErrorKind::Cancelled,
            OperationError::Abandoned { .. } => ErrorKind::ConnectionLost,
        }
    }

    /// Captured stderr, when the failure came from a remote command.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            OperationError::CommandFailed { stderr, .. } => Some(stderr),
            OperationError::Remote {
                source: crate::ssh::Error::Remote { stderr, .. },
                ..
            } => Some(stderr),
            OperationError::Pipeline { source, .. } => source.error.stderr(),
            _ => None,
        }
    }
}
