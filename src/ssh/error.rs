// ABOUTME: Errors raised by the SSH session adapter.
// ABOUTME: Each variant maps onto the engine-wide ErrorKind taxonomy.

use crate::error::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("not connected")]
    NotConnected,

    #[error("authentication failed: no valid credentials")]
    AuthenticationFailed,

    #[error("SSH agent not available: {0}")]
    AgentUnavailable(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("command timed out after {0:?}")]
    CommandTimeout(std::time::Duration),

    #[error("remote command `{command}` exited with code {exit_code}: {}", stderr.trim())]
    Remote {
        command: String,
        exit_code: u32,
        stderr: String,
    },

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("cancelled")]
    Cancelled,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_)
            | Error::NotConnected
            | Error::AuthenticationFailed
            | Error::AgentUnavailable(_)
            | Error::KeyLoadFailed { .. }
            | Error::Key(_) => ErrorKind::Connection,
            Error::ConnectionLost(_) | Error::Protocol(_) => ErrorKind::ConnectionLost,
            Error::CommandTimeout(_) | Error::Remote { .. } => ErrorKind::Remote,
            Error::Transfer(_) | Error::Io(_) => ErrorKind::Transfer,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
