// ABOUTME: Application-wide error types for dockside.
// ABOUTME: Uses thiserror; every error maps onto a small ErrorKind taxonomy.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse failure categories shared by every layer of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The remote channel was never established (or is not connected).
    Connection,
    /// The connection dropped while an operation was in flight.
    ConnectionLost,
    /// A remote command exited non-zero or wrote unexpected stderr.
    Remote,
    /// Archive or byte-stream copy failed.
    Transfer,
    /// A pipeline for the same target and environment is already active.
    JobInProgress,
    /// The operation was cancelled by the operator or a supervisor.
    Cancelled,
    /// The target's current status does not allow the operation.
    Ineligible,
    /// Invalid or missing configuration.
    Config,
    /// The persisted state collaborator failed.
    Store,
}

impl ErrorKind {
    /// Process exit status for a command that failed with this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Config => 2,
            ErrorKind::Connection => 3,
            ErrorKind::ConnectionLost => 4,
            ErrorKind::Remote => 5,
            ErrorKind::Transfer => 6,
            ErrorKind::JobInProgress => 7,
            ErrorKind::Ineligible => 8,
            ErrorKind::Store => 9,
            ErrorKind::Cancelled => 130,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown connection profile: {0}")]
    UnknownProfile(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Ssh(#[from] crate::ssh::Error),

    #[error("runtime detection failed: {0}")]
    RuntimeDetection(#[from] crate::runtime::DetectionError),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),

    #[error(transparent)]
    Operation(#[from] crate::ops::OperationError),

    #[error("batch aborted after {failed} failed operation(s)")]
    BatchAborted { failed: usize },

    #[error("batch finished with {failed} failed operation(s)")]
    BatchFailed { failed: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Ssh(e) => e.kind(),
            Error::RuntimeDetection(crate::runtime::DetectionError::Ssh(e)) => e.kind(),
            Error::RuntimeDetection(_) => ErrorKind::Connection,
            Error::Store(_) => ErrorKind::Store,
            Error::Registry(e) => e.kind(),
            Error::Operation(e) => e.kind(),
            Error::BatchAborted { .. } | Error::BatchFailed { .. } => ErrorKind::Remote,
            Error::Io(_) => ErrorKind::Transfer,
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::UnknownProfile(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::Yaml(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
