// ABOUTME: Test support utilities.
// ABOUTME: A scripted in-memory RemoteShell plus helpers for building an engine around it.

#![allow(dead_code)]

use async_trait::async_trait;
use dockside::ssh::{
    CommandOutput, Error, Interactive, ProgressFn, PtyRequest, RemoteShell, Result, StreamExit,
    StreamingExec, streaming_pair,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("dockside=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Two-line `docker ps` listing used across tests.
pub const LISTING: &str = "\
a1b2c3d4e5f6\tshop/web:1.4\t\"/entrypoint.sh\"\t2024-03-01 10:15:00 +0000 UTC\tUp 3 hours\t0.0.0.0:8080->80/tcp
0f9e8d7c6b5a\tshop/db:8\t\"docker-entrypoint.s…\"\t2024-02-11 08:00:00 +0000 UTC\tExited (0) 2 days ago\t
";

/// How the fake answers a command.
#[derive(Clone)]
pub enum Reply {
    Output {
        exit_code: u32,
        stdout: String,
        stderr: String,
    },
    /// Stream the lines, then exit. `exit_code: None` keeps running until cancelled.
    Stream {
        stdout: Vec<String>,
        stderr: Vec<String>,
        exit_code: Option<u32>,
    },
    ConnectionLost,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Reply::Output {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(exit_code: u32, stderr: &str) -> Self {
        Reply::Output {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn stream(stdout: &[&str], stderr: &[&str], exit_code: Option<u32>) -> Self {
        Reply::Stream {
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
            stderr: stderr.iter().map(|s| s.to_string()).collect(),
            exit_code,
        }
    }
}

/// A recorded upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub local: PathBuf,
    pub remote: String,
    pub bytes: u64,
}

/// RemoteShell whose replies are scripted by command substring.
///
/// The first rule whose pattern occurs in the command wins; unmatched
/// commands succeed with empty output.
#[derive(Default)]
pub struct FakeShell {
    rules: Mutex<Vec<(String, Reply)>>,
    commands: Mutex<Vec<String>>,
    uploads: Mutex<Vec<Upload>>,
    upload_delay: Mutex<Option<Duration>>,
    download_content: Mutex<Vec<u8>>,
    terminal_writes: Arc<Mutex<Vec<String>>>,
    terminal_rules: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeShell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, pattern: &str, reply: Reply) -> &Self {
        self.rules.lock().push((pattern.to_string(), reply));
        self
    }

    /// Replace every rule for `pattern`.
    pub fn replace(&self, pattern: &str, reply: Reply) {
        let mut rules = self.rules.lock();
        rules.retain(|(p, _)| p != pattern);
        rules.insert(0, (pattern.to_string(), reply));
    }

    /// Make the interactive terminal print `output` after any write containing `pattern`.
    pub fn on_terminal(&self, pattern: &str, output: &str) -> &Self {
        self.terminal_rules
            .lock()
            .push((pattern.to_string(), output.to_string()));
        self
    }

    pub fn delay_uploads(&self, delay: Duration) {
        *self.upload_delay.lock() = Some(delay);
    }

    pub fn serve_download(&self, content: &[u8]) {
        *self.download_content.lock() = content.to_vec();
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.commands.lock().iter().any(|c| c.contains(pattern))
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().clone()
    }

    pub fn terminal_writes(&self) -> Vec<String> {
        self.terminal_writes.lock().clone()
    }

    fn reply_for(&self, command: &str) -> Reply {
        self.commands.lock().push(command.to_string());
        self.rules
            .lock()
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Reply::ok(""))
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        match self.reply_for(command) {
            Reply::Output {
                exit_code,
                stdout,
                stderr,
            } => Ok(CommandOutput {
                exit_code,
                stdout,
                stderr,
            }),
            Reply::Stream {
                stdout,
                stderr,
                exit_code,
            } => Ok(CommandOutput {
                exit_code: exit_code.unwrap_or(0),
                stdout: stdout.join("\n"),
                stderr: stderr.join("\n"),
            }),
            Reply::ConnectionLost => Err(Error::ConnectionLost("reset by peer".to_string())),
        }
    }

    async fn exec_streaming(&self, command: &str) -> Result<StreamingExec> {
        let (stdout, stderr, exit_code) = match self.reply_for(command) {
            Reply::Output {
                exit_code,
                stdout,
                stderr,
            } => (
                stdout.lines().map(str::to_string).collect::<Vec<_>>(),
                stderr.lines().map(str::to_string).collect::<Vec<_>>(),
                Some(exit_code),
            ),
            Reply::Stream {
                stdout,
                stderr,
                exit_code,
            } => (stdout, stderr, exit_code),
            Reply::ConnectionLost => {
                return Err(Error::ConnectionLost("reset by peer".to_string()));
            }
        };

        let (feed, exec) = streaming_pair();
        tokio::spawn(async move {
            for line in stdout {
                feed.stdout(line);
            }
            for line in stderr {
                feed.stderr(line);
            }
            match exit_code {
                Some(code) => feed.finish(Ok(StreamExit::Exited(code))),
                None => {
                    feed.cancelled().await;
                    feed.finish(Ok(StreamExit::Cancelled));
                }
            }
        });
        Ok(exec)
    }

    async fn open_interactive(&self, _pty: &PtyRequest) -> Result<Box<dyn Interactive>> {
        self.commands.lock().push("<interactive>".to_string());
        Ok(Box::new(FakeTerminal {
            writes: Arc::clone(&self.terminal_writes),
            rules: Arc::clone(&self.terminal_rules),
            buffer: String::new(),
        }))
    }

    async fn upload(&self, local: &Path, remote: &str, progress: ProgressFn<'_>) -> Result<u64> {
        let delay = *self.upload_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let bytes = std::fs::metadata(local)?.len();
        progress(bytes / 2);
        progress(bytes);
        self.uploads.lock().push(Upload {
            local: local.to_path_buf(),
            remote: remote.to_string(),
            bytes,
        });
        Ok(bytes)
    }

    async fn download(
        &self,
        remote: &str,
        local: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<u64> {
        self.commands.lock().push(format!("<download {remote}>"));
        let content = self.download_content.lock().clone();
        std::fs::write(local, &content)?;
        progress(content.len() as u64);
        Ok(content.len() as u64)
    }
}

/// Terminal that records writes and answers them from the shell's terminal rules.
struct FakeTerminal {
    writes: Arc<Mutex<Vec<String>>>,
    rules: Arc<Mutex<Vec<(String, String)>>>,
    buffer: String,
}

#[async_trait]
impl Interactive for FakeTerminal {
    async fn write(&mut self, text: &str) -> Result<()> {
        self.writes.lock().push(text.to_string());
        let reply = self
            .rules
            .lock()
            .iter()
            .find(|(pattern, _)| text.contains(pattern.as_str()))
            .map(|(_, output)| output.clone());
        if let Some(output) = reply {
            self.buffer.push_str(&output);
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
