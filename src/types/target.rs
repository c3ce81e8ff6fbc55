// ABOUTME: Remote workload records produced by a registry refresh.
// ABOUTME: Targets are immutable; a refresh replaces them wholesale.

use super::TargetId;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fmt;

/// Lifecycle of a workload, classified from the runtime's status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "exit_code")]
pub enum LifecycleState {
    Running,
    Paused,
    Restarting,
    /// Stopped; carries the exit code when the runtime reports one.
    Exited(Option<i32>),
    Created,
    Dead,
    Removing,
}

impl LifecycleState {
    pub fn is_running(&self) -> bool {
        matches!(self, LifecycleState::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, LifecycleState::Exited(_) | LifecycleState::Created)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Paused => write!(f, "paused"),
            LifecycleState::Restarting => write!(f, "restarting"),
            LifecycleState::Exited(Some(code)) => write!(f, "exited ({code})"),
            LifecycleState::Exited(None) => write!(f, "exited"),
            LifecycleState::Created => write!(f, "created"),
            LifecycleState::Dead => write!(f, "dead"),
            LifecycleState::Removing => write!(f, "removing"),
        }
    }
}

/// A published or exposed container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    /// Host address the port is bound to; `None` when only exposed.
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: String,
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.host_ip, self.host_port) {
            (Some(ip), Some(port)) => write!(
                f,
                "{ip}:{port}->{}/{}",
                self.container_port, self.protocol
            ),
            _ => write!(f, "{}/{}", self.container_port, self.protocol),
        }
    }
}

/// A remotely managed workload as seen by the last registry refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub id: TargetId,
    pub image: String,
    /// Human-readable command column (possibly truncated by the runtime).
    pub command: String,
    pub created_at: DateTime<FixedOffset>,
    /// Raw status text, e.g. `Up 3 hours` or `Exited (0) 2 days ago`.
    pub status: String,
    pub state: LifecycleState,
    pub ports: Vec<PortBinding>,
}
