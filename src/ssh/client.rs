// ABOUTME: The russh-backed session adapter.
// ABOUTME: One authenticated connection that opens a channel per command, stream, terminal or transfer.

use super::auth::{Credentials, Identity};
use super::error::{Error, Result};
use super::host_keys::{HostKeyPolicy, HostKeyVerifier};
use super::interactive::PtySession;
use super::shell::{CommandOutput, Interactive, ProgressFn, PtyRequest, RemoteShell};
use super::stream::{LineSplitter, StreamExit, StreamFeed, StreamingExec, streaming_pair};
use super::transfer;
use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect, Sig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credentials: Credentials,
    pub host_keys: HostKeyPolicy,
    /// Upper bound for a blocking command.
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            credentials: Credentials::default(),
            host_keys: HostKeyPolicy::default(),
            command_timeout: Duration::from_secs(300),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn trust_first_connection(mut self, trust: bool) -> Self {
        self.host_keys.trust_first_connection = trust;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// An established SSH session.
///
/// Blocking and streaming commands each open their own channel and may run
/// concurrently. Interactive terminals are serialized through a gate.
pub struct Session {
    config: SessionConfig,
    handle: Arc<Handle<HostKeyVerifier>>,
    interactive_gate: Arc<tokio::sync::Mutex<()>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("user", &self.config.user)
            .field("closed", &self.handle.is_closed())
            .finish()
    }
}

impl Session {
    /// Connect, verify the host key and log in.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let identity = Identity::load(&config.credentials).await?;
        let verifier = HostKeyVerifier::new(&config.host, config.port, config.host_keys.clone());
        let transport = client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        debug!(host = %config.host, port = config.port, user = %config.user, "Connecting");
        let mut handle = client::connect(
            Arc::new(transport),
            (config.host.as_str(), config.port),
            verifier,
        )
        .await
        .map_err(|e| Error::Connection(format!("{}:{}: {e}", config.host, config.port)))?;

        identity.login(&mut handle, &config.user).await?;
        debug!(host = %config.host, "Authenticated");

        Ok(Self {
            config,
            handle: Arc::new(handle),
            interactive_gate: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Open a channel, telling a dropped connection apart from one never made.
    async fn open_channel(&self) -> Result<Channel<Msg>> {
        if self.handle.is_closed() {
            return Err(Error::NotConnected);
        }
        match self.handle.channel_open_session().await {
            Ok(channel) => Ok(channel),
            Err(e) if self.handle.is_closed() => Err(Error::ConnectionLost(e.to_string())),
            Err(e) => Err(Error::Protocol(e)),
        }
    }

    /// Run `command` to completion, giving up after `limit`.
    pub async fn exec_within(&self, command: &str, limit: Duration) -> Result<CommandOutput> {
        tokio::time::timeout(limit, self.collect(command))
            .await
            .map_err(|_| Error::CommandTimeout(limit))?
    }

    async fn collect(&self, command: &str) -> Result<CommandOutput> {
        debug!(command, "Running");
        let mut channel = self.open_channel().await?;
        channel.exec(true, command).await?;

        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        let mut status = None;
        let mut eof = false;

        // Output may still arrive after the exit status, so wait for both.
        while !(eof && status.is_some()) {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => stderr.extend_from_slice(&data),
                Some(ChannelMsg::ExitStatus { exit_status }) => status = Some(exit_status),
                Some(ChannelMsg::Eof) => eof = true,
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        match status {
            Some(exit_code) => Ok(CommandOutput {
                exit_code,
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            }),
            None => Err(Error::ConnectionLost(format!(
                "channel closed before `{command}` reported an exit status"
            ))),
        }
    }

    /// Close the connection politely.
    pub async fn disconnect(self) -> Result<()> {
        debug!(host = %self.config.host, "Disconnecting");
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// Pump a streaming channel into its feed until exit or cancellation.
async fn pump_stream(mut channel: Channel<Msg>, feed: StreamFeed) {
    let mut out = LineSplitter::default();
    let mut err = LineSplitter::default();
    let mut exit_code = None;

    let result = loop {
        tokio::select! {
            _ = feed.cancelled() => {
                if let Err(e) = channel.signal(Sig::TERM).await {
                    debug!(error = %e, "Could not signal remote process");
                }
                let _ = channel.close().await;
                break Ok(StreamExit::Cancelled);
            }
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => {
                    for line in out.push(&data) {
                        feed.stdout(line);
                    }
                }
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                    for line in err.push(&data) {
                        feed.stderr(line);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                Some(ChannelMsg::Close) | None => {
                    break exit_code.map(StreamExit::Exited).ok_or_else(|| {
                        Error::ConnectionLost(
                            "channel closed before the command reported an exit status".to_string(),
                        )
                    });
                }
                Some(_) => {}
            }
        }
    };

    if let Some(line) = out.finish() {
        feed.stdout(line);
    }
    if let Some(line) = err.finish() {
        feed.stderr(line);
    }
    feed.finish(result);
}

#[async_trait]
impl RemoteShell for Session {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_within(command, self.config.command_timeout).await
    }

    async fn exec_streaming(&self, command: &str) -> Result<StreamingExec> {
        debug!(command, "Streaming");
        let channel = self.open_channel().await?;
        channel.exec(true, command).await?;

        let (feed, exec) = streaming_pair();
        tokio::spawn(pump_stream(channel, feed));
        Ok(exec)
    }

    async fn open_interactive(&self, pty: &PtyRequest) -> Result<Box<dyn Interactive>> {
        let gate = Arc::clone(&self.interactive_gate).lock_owned().await;
        let channel = self.open_channel().await?;
        channel
            .request_pty(true, &pty.term, pty.cols, pty.rows, 0, 0, &[])
            .await?;
        channel.request_shell(true).await?;
        debug!(term = %pty.term, cols = pty.cols, rows = pty.rows, "Interactive shell opened");
        Ok(Box::new(PtySession::start(channel, gate)))
    }

    async fn upload(&self, local: &Path, remote: &str, progress: ProgressFn<'_>) -> Result<u64> {
        let channel = self.open_channel().await?;
        transfer::upload(channel, local, remote, progress).await
    }

    async fn download(
        &self,
        remote: &str,
        local: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<u64> {
        let channel = self.open_channel().await?;
        transfer::download(channel, remote, local, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_connection_details() {
        let config = SessionConfig::new("app.example.com", "deploy")
            .port(2222)
            .trust_first_connection(true)
            .command_timeout(Duration::from_secs(30));
        assert_eq!((config.host.as_str(), config.port), ("app.example.com", 2222));
        assert!(config.host_keys.trust_first_connection);
        assert!(matches!(config.credentials, Credentials::Discover));
        assert_eq!(config.command_timeout, Duration::from_secs(30));
    }

    #[test]
    fn debug_output_redacts_password() {
        let config =
            SessionConfig::new("h", "u").credentials(Credentials::Password("hunter2".to_string()));
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
