// ABOUTME: Runtime detection on the remote host.
// ABOUTME: Looks for the docker client first, then podman.

use super::types::RuntimeType;
use crate::ssh::RemoteShell;
use tracing::debug;

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked docker and podman)")]
    NoRuntimeFound,

    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),
}

/// Detect which container CLI the remote host provides.
///
/// An explicit `preferred` runtime skips detection entirely.
pub async fn detect_runtime(
    shell: &dyn RemoteShell,
    preferred: Option<RuntimeType>,
) -> Result<RuntimeType, DetectionError> {
    if let Some(runtime) = preferred {
        return Ok(runtime);
    }

    for runtime in [RuntimeType::Docker, RuntimeType::Podman] {
        let output = shell
            .exec(&format!("command -v {}", runtime.binary()))
            .await?;
        if output.success() && !output.stdout.trim().is_empty() {
            debug!(%runtime, path = output.stdout.trim(), "runtime detected");
            return Ok(runtime);
        }
    }

    Err(DetectionError::NoRuntimeFound)
}
