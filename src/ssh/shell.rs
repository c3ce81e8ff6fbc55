// ABOUTME: The remote execution seam used by every higher layer.
// ABOUTME: Blocking exec, streaming exec, interactive PTY, and byte-stream copies.

use super::error::{Error, Result};
use super::stream::StreamingExec;
use async_trait::async_trait;
use std::path::Path;

/// Output from a remote command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Pseudo-terminal parameters for interactive sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    pub cols: u32,
    pub rows: u32,
}

impl Default for PtyRequest {
    fn default() -> Self {
        Self {
            term: "xterm".to_string(),
            cols: 200,
            rows: 50,
        }
    }
}

/// Callback receiving the cumulative number of bytes copied so far.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(u64) + Send);

/// A stateful terminal exchange. Reads never block.
#[async_trait]
pub trait Interactive: Send {
    /// Send raw text to the terminal.
    async fn write(&mut self, text: &str) -> Result<()>;

    /// Everything the terminal printed since the last read; empty if nothing arrived.
    fn read_available(&mut self) -> Result<String>;

    /// Close the terminal channel.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Remote command execution over one logical connection.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a command to completion, capturing its output regardless of exit code.
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Start a command and return line streams, a cancel handle, and its completion.
    async fn exec_streaming(&self, command: &str) -> Result<StreamingExec>;

    /// Open an interactive pseudo-terminal. Only one may be open per connection.
    async fn open_interactive(&self, pty: &PtyRequest) -> Result<Box<dyn Interactive>>;

    /// Copy a local file to `remote`, reporting cumulative bytes sent.
    async fn upload(&self, local: &Path, remote: &str, progress: ProgressFn<'_>) -> Result<u64>;

    /// Copy `remote` to a local file, reporting cumulative bytes received.
    async fn download(&self, remote: &str, local: &Path, progress: ProgressFn<'_>)
    -> Result<u64>;

    /// Run a command and fail with [`Error::Remote`] on a non-zero exit code.
    async fn exec_checked(&self, command: &str) -> Result<CommandOutput> {
        let output = self.exec(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::Remote {
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}
