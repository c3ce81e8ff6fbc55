// ABOUTME: Interactive pseudo-terminal sessions and framed command exchanges.
// ABOUTME: Sentinel framing when the remote shell cooperates, settle delays otherwise.

use super::error::{Error, Result};
use super::shell::Interactive;
use async_trait::async_trait;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Marker printed by the remote shell after each framed command.
///
/// The command that prints it spells the marker in two halves so the
/// terminal's echo of the typed input never matches.
pub const SENTINEL_MARKER: &str = "__DOCKSIDE_DONE__";
const SENTINEL_COMMAND: &str = "printf '%s_%s %s\\n' __DOCKSIDE DONE__ $?";

enum Outgoing {
    Data(Vec<u8>),
    Close,
}

/// A PTY shell channel driven by a background task.
pub(crate) struct PtySession {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    incoming: mpsc::UnboundedReceiver<Vec<u8>>,
    closed: Arc<AtomicBool>,
    task: JoinHandle<()>,
    _gate: OwnedMutexGuard<()>,
}

impl PtySession {
    pub(crate) fn start(channel: Channel<Msg>, gate: OwnedMutexGuard<()>) -> Self {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(drive_pty(channel, out_rx, in_tx, closed.clone()));
        Self {
            outgoing: out_tx,
            incoming: in_rx,
            closed,
            task,
            _gate: gate,
        }
    }
}

async fn drive_pty(
    mut channel: Channel<Msg>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    incoming: mpsc::UnboundedSender<Vec<u8>>,
    closed: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    let _ = incoming.send(data.to_vec());
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            },
            out = outgoing.recv() => match out {
                Some(Outgoing::Data(bytes)) => {
                    if let Err(e) = channel.data(&bytes[..]).await {
                        debug!("interactive write failed: {}", e);
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = channel.eof().await;
                    let _ = channel.close().await;
                    break;
                }
            },
        }
    }
    closed.store(true, Ordering::SeqCst);
}

#[async_trait]
impl Interactive for PtySession {
    async fn write(&mut self, text: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionLost("interactive channel closed".to_string()));
        }
        self.outgoing
            .send(Outgoing::Data(text.as_bytes().to_vec()))
            .map_err(|_| Error::ConnectionLost("interactive channel closed".to_string()))
    }

    fn read_available(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        while let Ok(chunk) = self.incoming.try_recv() {
            buf.extend_from_slice(&chunk);
        }
        if buf.is_empty() && self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionLost("interactive channel closed".to_string()));
        }
        Ok(String::from_utf8_lossy(&buf).to_string())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let _ = self.outgoing.send(Outgoing::Close);
        if tokio::time::timeout(Duration::from_secs(2), self.task)
            .await
            .is_err()
        {
            debug!("interactive channel did not close within 2s");
        }
        Ok(())
    }
}

/// Timing for interactive exchanges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSettings {
    /// Wait after each write before reading when no sentinel is used.
    pub settle_delay: Duration,
    /// Interval between reads while waiting for the sentinel.
    pub poll_interval: Duration,
    /// Give up waiting for the sentinel after this long.
    pub timeout: Duration,
    /// Frame each command with a sentinel printed by the remote shell.
    pub sentinel: bool,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(300),
            sentinel: true,
        }
    }
}

/// Terminal output of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub output: String,
    /// Exit status reported through the sentinel. `None` means inconclusive.
    pub exit_code: Option<i32>,
}

impl Exchange {
    /// True only when the remote shell confirmed a zero exit status.
    pub fn confirmed_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Write one command and collect what the terminal printed in response.
///
/// With settle-delay framing the result is best effort: slow commands may
/// still be printing when the read happens.
pub async fn exchange(
    session: &mut dyn Interactive,
    command: &str,
    settings: &ExchangeSettings,
) -> Result<Exchange> {
    session.write(&format!("{command}\n")).await?;

    if !settings.sentinel {
        tokio::time::sleep(settings.settle_delay).await;
        return Ok(Exchange {
            output: session.read_available()?,
            exit_code: None,
        });
    }

    session.write(&format!("{SENTINEL_COMMAND}\n")).await?;
    let deadline = tokio::time::Instant::now() + settings.timeout;
    let mut output = String::new();

    loop {
        tokio::time::sleep(settings.poll_interval).await;
        output.push_str(&session.read_available()?);

        if let Some((before, exit_code)) = split_sentinel(&output) {
            return Ok(Exchange {
                output: before,
                exit_code,
            });
        }

        if tokio::time::Instant::now() >= deadline {
            warn!(command, "no sentinel within {:?}; output inconclusive", settings.timeout);
            return Ok(Exchange {
                output,
                exit_code: None,
            });
        }
    }
}

/// Split terminal output at the sentinel, returning the preceding text and exit code.
fn split_sentinel(output: &str) -> Option<(String, Option<i32>)> {
    let pos = output.find(SENTINEL_MARKER)?;
    let rest = &output[pos + SENTINEL_MARKER.len()..];
    // Wait until the whole status line has arrived.
    let line_end = rest.find('\n')?;
    let exit_code = rest[..line_end].trim().parse::<i32>().ok();
    Some((output[..pos].to_string(), exit_code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Terminal that replies to each written line from a script.
    struct ScriptedTerminal {
        replies: VecDeque<&'static str>,
        buffer: String,
        writes: Vec<String>,
    }

    #[async_trait]
    impl Interactive for ScriptedTerminal {
        async fn write(&mut self, text: &str) -> Result<()> {
            self.writes.push(text.to_string());
            self.buffer.push_str(text);
            if let Some(reply) = self.replies.pop_front() {
                self.buffer.push_str(reply);
            }
            Ok(())
        }

        fn read_available(&mut self) -> Result<String> {
            Ok(std::mem::take(&mut self.buffer))
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn fast() -> ExchangeSettings {
        ExchangeSettings {
            settle_delay: Duration::from_millis(1),
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_millis(50),
            sentinel: true,
        }
    }

    #[test]
    fn sentinel_command_echo_does_not_match_marker() {
        assert!(!SENTINEL_COMMAND.contains(SENTINEL_MARKER));
    }

    #[test]
    fn split_waits_for_complete_status_line() {
        assert_eq!(split_sentinel("abc __DOCKSIDE_DONE__ 1"), None);
        assert_eq!(
            split_sentinel("dump ok\r\n__DOCKSIDE_DONE__ 0\r\n$ "),
            Some(("dump ok\r\n".to_string(), Some(0)))
        );
    }

    #[tokio::test]
    async fn sentinel_exchange_reports_exit_code() {
        let mut term = ScriptedTerminal {
            replies: VecDeque::from(["mysqldump: Got error: 1045: Access denied\r\n", "__DOCKSIDE_DONE__ 2\r\n"]),
            buffer: String::new(),
            writes: vec![],
        };

        let result = exchange(&mut term, "mysqldump shop > /tmp/x.sql", &fast())
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(2));
        assert!(result.output.contains("Access denied"));
        assert!(!result.confirmed_success());
        assert_eq!(term.writes.len(), 2);
    }

    #[tokio::test]
    async fn missing_sentinel_is_inconclusive() {
        let mut term = ScriptedTerminal {
            replies: VecDeque::from(["still going\r\n"]),
            buffer: String::new(),
            writes: vec![],
        };

        let result = exchange(&mut term, "sleep 100", &fast()).await.unwrap();
        assert_eq!(result.exit_code, None);
        assert!(result.output.contains("still going"));
    }

    #[tokio::test]
    async fn settle_mode_reads_once_without_sentinel() {
        let mut term = ScriptedTerminal {
            replies: VecDeque::from(["root@abc:/# "]),
            buffer: String::new(),
            writes: vec![],
        };
        let settings = ExchangeSettings {
            sentinel: false,
            ..fast()
        };

        let result = exchange(&mut term, "export A=1", &settings).await.unwrap();
        assert_eq!(result.exit_code, None);
        assert_eq!(term.writes, vec!["export A=1\n"]);
    }
}
