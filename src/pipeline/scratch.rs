// ABOUTME: Scratch artifacts owned by one pipeline run, local and remote.
// ABOUTME: Cleanup always runs and only ever logs its own failures.

use crate::runtime::remove_file;
use crate::ssh::RemoteShell;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

pub struct Scratch {
    local: Option<TempDir>,
    remote: Vec<String>,
}

impl Scratch {
    /// Create an exclusive local directory for this run.
    pub fn new() -> std::io::Result<Self> {
        let local = tempfile::Builder::new().prefix("dockside-").tempdir()?;
        Ok(Self {
            local: Some(local),
            remote: Vec::new(),
        })
    }

    pub fn local_dir(&self) -> &Path {
        self.local
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new("."))
    }

    /// Register a host file to delete during cleanup.
    pub fn track_remote(&mut self, path: impl Into<String>) {
        self.remote.push(path.into());
    }

    /// Remove everything. Returns one warning per artifact that could not be removed.
    pub async fn cleanup(mut self, shell: &dyn RemoteShell) -> Vec<String> {
        let mut warnings = Vec::new();

        for path in std::mem::take(&mut self.remote) {
            match shell.exec(&remove_file(&path)).await {
                Ok(output) if output.success() => debug!(path, "Removed remote scratch file"),
                Ok(output) => {
                    let msg = format!(
                        "failed to remove {path} (exit {}): {}",
                        output.exit_code,
                        output.stderr.trim()
                    );
                    warn!("{msg}");
                    warnings.push(msg);
                }
                Err(e) => {
                    let msg = format!("failed to remove {path}: {e}");
                    warn!("{msg}");
                    warnings.push(msg);
                }
            }
        }

        if let Some(local) = self.local.take() {
            let path = local.path().display().to_string();
            if let Err(e) = local.close() {
                let msg = format!("failed to remove {path}: {e}");
                warn!("{msg}");
                warnings.push(msg);
            }
        }

        warnings
    }
}
