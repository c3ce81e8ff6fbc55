// ABOUTME: Line-oriented output streams for long-running remote commands.
// ABOUTME: A producer feed on one side, drainable streams plus cancel/completion on the other.

use super::error::{Error, Result};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// How a streaming command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    Exited(u32),
    Cancelled,
}

impl StreamExit {
    pub fn success(&self) -> bool {
        matches!(self, StreamExit::Exited(0))
    }
}

/// A running remote command with separated output streams.
pub struct StreamingExec {
    pub stdout: LineStream,
    pub stderr: LineStream,
    pub cancel: CancelHandle,
    pub completion: Completion,
}

impl std::fmt::Debug for StreamingExec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingExec")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Create a connected feed/exec pair.
///
/// The feed side is driven by whatever reads the remote channel; the exec side
/// is handed to the caller.
pub fn streaming_pair() -> (StreamFeed, StreamingExec) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (err_tx, err_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = oneshot::channel();
    let token = CancellationToken::new();
    let cancelled = Arc::new(AtomicBool::new(false));

    let feed = StreamFeed {
        out_tx,
        err_tx,
        done_tx: Some(done_tx),
        token: token.clone(),
        cancelled: cancelled.clone(),
    };

    let exec = StreamingExec {
        stdout: LineStream {
            rx: out_rx,
            cancelled: cancelled.clone(),
        },
        stderr: LineStream {
            rx: err_rx,
            cancelled: cancelled.clone(),
        },
        cancel: CancelHandle { token, cancelled },
        completion: Completion { rx: done_rx },
    };

    (feed, exec)
}

/// Lazy sequence of output lines, infinite until the process exits.
///
/// Once cancellation has been requested no further lines are yielded, even
/// if some were already buffered.
pub struct LineStream {
    rx: mpsc::UnboundedReceiver<String>,
    cancelled: Arc<AtomicBool>,
}

impl LineStream {
    /// Take every buffered line without waiting.
    pub fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.cancelled.load(Ordering::SeqCst) {
            return lines;
        }
        while let Ok(line) = self.rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    /// Wait for the next line; `None` once the stream has ended or was cancelled.
    pub async fn next_line(&mut self) -> Option<String> {
        if self.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        let line = self.rx.recv().await;
        if self.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        line
    }
}

impl Stream for LineStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Requests termination of the remote process.
#[derive(Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Best-effort: the remote side is signalled and the completion resolves as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Resolves when the remote process exits or the command is cancelled.
pub struct Completion {
    rx: oneshot::Receiver<Result<StreamExit>>,
}

impl Future for Completion {
    type Output = Result<StreamExit>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::ConnectionLost(
                "stream reader stopped without reporting an exit status".to_string(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Producer side of a [`StreamingExec`].
pub struct StreamFeed {
    out_tx: mpsc::UnboundedSender<String>,
    err_tx: mpsc::UnboundedSender<String>,
    done_tx: Option<oneshot::Sender<Result<StreamExit>>>,
    token: CancellationToken,
    cancelled: Arc<AtomicBool>,
}

impl StreamFeed {
    pub fn stdout(&self, line: impl Into<String>) {
        if !self.is_cancelled() {
            let _ = self.out_tx.send(line.into());
        }
    }

    pub fn stderr(&self, line: impl Into<String>) {
        if !self.is_cancelled() {
            let _ = self.err_tx.send(line.into());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the consumer asks for cancellation.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Resolve the completion. A cancelled feed always resolves as [`StreamExit::Cancelled`].
    pub fn finish(mut self, result: Result<StreamExit>) {
        let result = if self.is_cancelled() {
            Ok(StreamExit::Cancelled)
        } else {
            result
        };
        if let Some(tx) = self.done_tx.take() {
            let _ = tx.send(result);
        }
    }
}

/// Splits a byte stream into lines, tolerating chunks that end mid-line.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Feed a chunk and return every completed line (without terminators).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Flush a trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.pending).trim_end_matches('\r').to_string();
        self.pending.clear();
        Some(text)
    }
}
