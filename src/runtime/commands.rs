// ABOUTME: Builders for the container runtime command lines run over SSH.
// ABOUTME: All user-influenced arguments are single-quoted for the remote shell.

use super::types::RuntimeType;
use crate::types::{LifecycleAction, TargetId};

/// Tab-separated listing: id, image, command, created, status, ports.
pub const LIST_FORMAT: &str =
    r"{{.ID}}\t{{.Image}}\t{{.Command}}\t{{.CreatedAt}}\t{{.Status}}\t{{.Ports}}";

/// Quote a value for a POSIX shell.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Command line builder for one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerCli {
    runtime: RuntimeType,
}

impl ContainerCli {
    pub fn new(runtime: RuntimeType) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> RuntimeType {
        self.runtime
    }

    fn bin(&self) -> &'static str {
        self.runtime.binary()
    }

    /// List every container, running or not.
    pub fn list(&self) -> String {
        format!("{} ps -a --format {}", self.bin(), quote(LIST_FORMAT))
    }

    pub fn lifecycle(&self, action: LifecycleAction, target: &TargetId) -> String {
        format!("{} {} {}", self.bin(), action.verb(), target)
    }

    pub fn inspect(&self, target: &TargetId) -> String {
        format!("{} inspect {}", self.bin(), target)
    }

    pub fn logs(&self, target: &TargetId, tail: u32, follow: bool) -> String {
        let follow = if follow { " -f" } else { "" };
        format!("{} logs --tail {}{} {}", self.bin(), tail, follow, target)
    }

    /// Run a shell command inside the target, optionally from `workdir`.
    pub fn exec_in(&self, target: &TargetId, workdir: Option<&str>, command: &str) -> String {
        let workdir = workdir
            .map(|dir| format!(" -w {}", quote(dir)))
            .unwrap_or_default();
        format!(
            "{} exec{} {} sh -c {}",
            self.bin(),
            workdir,
            target,
            quote(command)
        )
    }

    /// Attach an interactive shell inside the target.
    pub fn shell_into(&self, target: &TargetId) -> String {
        format!(
            "{} exec -it {} sh -c {}",
            self.bin(),
            target,
            quote("command -v bash >/dev/null 2>&1 && exec bash || exec sh")
        )
    }

    /// Copy a file out of the target onto the host filesystem.
    pub fn copy_out(&self, target: &TargetId, container_path: &str, host_path: &str) -> String {
        format!(
            "{} cp {}:{} {}",
            self.bin(),
            target,
            quote(container_path),
            quote(host_path)
        )
    }

    /// Remove a file inside the target.
    pub fn remove_in(&self, target: &TargetId, container_path: &str) -> String {
        format!(
            "{} exec {} rm -f {}",
            self.bin(),
            target,
            quote(container_path)
        )
    }
}

/// Byte size of a host file, as printed by `stat`.
pub fn stat_size(path: &str) -> String {
    format!("stat -c %s {}", quote(path))
}

pub fn remove_file(path: &str) -> String {
    format!("rm -f {}", quote(path))
}
