// ABOUTME: SSH session adapter for remote hosts.
// ABOUTME: Blocking, streaming, and interactive execution plus byte-stream transfers.

mod auth;
mod client;
mod error;
mod host_keys;
mod interactive;
mod shell;
mod stream;
mod transfer;

pub use auth::Credentials;
pub use client::{Session, SessionConfig};
pub use error::{Error, Result};
pub use host_keys::{HostKeyPolicy, HostKeyVerifier};
pub use interactive::{Exchange, ExchangeSettings, SENTINEL_MARKER, exchange};
pub use shell::{CommandOutput, Interactive, ProgressFn, PtyRequest, RemoteShell};
pub use stream::{
    CancelHandle, Completion, LineSplitter, LineStream, StreamExit, StreamFeed, StreamingExec,
    streaming_pair,
};
