// ABOUTME: Console events emitted by running operations: log lines, stages, progress.
// ABOUTME: Sinks never block; a dropped receiver silently discards events.

use crate::pipeline::PipelineStage;
use crate::progress::ProgressSnapshot;
use crate::types::{Environment, Operation, TargetId};
use serde::Serialize;
use tokio::sync::mpsc;

/// Which stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Normal,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConsoleEvent {
    Log {
        target: TargetId,
        kind: LogKind,
        line: String,
    },
    Stage {
        target: TargetId,
        environment: Environment,
        stage: PipelineStage,
    },
    Progress {
        target: TargetId,
        snapshot: ProgressSnapshot,
    },
    OperationStarted {
        target: TargetId,
        operation: String,
    },
    OperationFinished {
        target: TargetId,
        operation: String,
        success: bool,
    },
}

impl ConsoleEvent {
    pub fn target(&self) -> &TargetId {
        match self {
            ConsoleEvent::Log { target, .. }
            | ConsoleEvent::Stage { target, .. }
            | ConsoleEvent::Progress { target, .. }
            | ConsoleEvent::OperationStarted { target, .. }
            | ConsoleEvent::OperationFinished { target, .. } => target,
        }
    }
}

/// Cloneable handle for publishing events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ConsoleEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, EventReceiver { rx })
    }

    /// A sink that drops everything.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ConsoleEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn log(&self, target: &TargetId, kind: LogKind, line: impl Into<String>) {
        self.emit(ConsoleEvent::Log {
            target: target.clone(),
            kind,
            line: line.into(),
        });
    }

    pub fn stage(&self, target: &TargetId, environment: &Environment, stage: PipelineStage) {
        self.emit(ConsoleEvent::Stage {
            target: target.clone(),
            environment: environment.clone(),
            stage,
        });
    }

    pub fn progress(&self, target: &TargetId, snapshot: ProgressSnapshot) {
        self.emit(ConsoleEvent::Progress {
            target: target.clone(),
            snapshot,
        });
    }

    pub fn started(&self, target: &TargetId, operation: &Operation) {
        self.emit(ConsoleEvent::OperationStarted {
            target: target.clone(),
            operation: operation.to_string(),
        });
    }

    pub fn finished(&self, target: &TargetId, operation: &Operation, success: bool) {
        self.emit(ConsoleEvent::OperationFinished {
            target: target.clone(),
            operation: operation.to_string(),
            success,
        });
    }
}

pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<ConsoleEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<ConsoleEvent> {
        self.rx.recv().await
    }

    /// Everything queued right now, without waiting.
    pub fn drain(&mut self) -> Vec<ConsoleEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
