// ABOUTME: Target registry: the cached workload list and the eligibility gate.
// ABOUTME: Refreshes build a fresh snapshot and publish it with a single swap.

mod snapshot;

pub use snapshot::Snapshot;

use crate::error::ErrorKind;
use crate::runtime::{ContainerCli, parse_listing};
use crate::ssh::RemoteShell;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to list targets: {0}")]
    Remote(#[from] crate::ssh::Error),

    #[error("no target matches '{0}'")]
    TargetNotFound(String),

    #[error("'{query}' matches {count} targets")]
    AmbiguousTarget { query: String, count: usize },

    #[error("{operation} is not available for {target} ({status})")]
    Ineligible {
        target: String,
        operation: String,
        status: String,
    },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Remote(e) => e.kind(),
            RegistryError::TargetNotFound(_) | RegistryError::AmbiguousTarget { .. } => {
                ErrorKind::Config
            }
            RegistryError::Ineligible { .. } => ErrorKind::Ineligible,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

pub struct TargetRegistry {
    shell: Arc<dyn RemoteShell>,
    cli: ContainerCli,
    current: RwLock<Arc<Snapshot>>,
}

impl TargetRegistry {
    pub fn new(shell: Arc<dyn RemoteShell>, cli: ContainerCli) -> Self {
        Self {
            shell,
            cli,
            current: RwLock::new(Arc::new(Snapshot::empty())),
        }
    }

    pub fn cli(&self) -> ContainerCli {
        self.cli
    }

    /// List targets on the host and publish the result.
    ///
    /// On failure the previous snapshot stays current.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let output = self.shell.exec_checked(&self.cli.list()).await?;
        let listing = parse_listing(&output.stdout);
        if listing.skipped > 0 {
            warn!(skipped = listing.skipped, "Some listing entries could not be parsed");
        }
        let snapshot = Snapshot::new(listing.targets, Utc::now(), listing.skipped);
        debug!(targets = snapshot.len(), "Registry refreshed");
        Ok(self.publish(snapshot))
    }

    /// Latest published snapshot. Never blocks on a refresh.
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Swap in `snapshot`, returning the new current value.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = snapshot.clone();
        snapshot
    }

    /// Refresh every `interval` until `cancel` fires. Failures are logged and retried next tick.
    pub fn spawn_refresh_loop(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            info!("Starting registry refresh loop (interval: {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = registry.refresh().await {
                            warn!(error = %e, "Registry refresh failed");
                        }
                    }
                }
            }
            debug!("Registry refresh loop stopped");
        })
    }
}
