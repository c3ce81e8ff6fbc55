// ABOUTME: Diagnostics accumulator for non-fatal warnings during console commands.
// ABOUTME: Collects cleanup, store and disconnect problems that never fail an operation.

use std::fmt;
use tracing::warn;

/// Problems worth telling the user about that do not change a command's outcome.
#[derive(Default)]
pub struct Diagnostics {
    collected: Vec<Warning>,
}

impl Diagnostics {
    /// Log `warning` and keep it for the end-of-command summary.
    pub fn warn(&mut self, warning: Warning) {
        warn!(kind = ?warning.kind, "{}", warning.message);
        self.collected.push(warning);
    }

    /// Record scratch-cleanup messages reported by an operation.
    pub fn cleanup<I, S>(&mut self, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for message in messages {
            self.warn(Warning::cleanup(message));
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.collected
    }

    pub fn has_warnings(&self) -> bool {
        !self.collected.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn of(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cleanup(message: impl Into<String>) -> Self {
        Self::of(WarningKind::Cleanup, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::of(WarningKind::Store, message)
    }

    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self::of(WarningKind::SshDisconnect, message)
    }

    /// Listing lines the registry could not parse.
    pub fn skipped_targets(count: usize) -> Self {
        Self::of(
            WarningKind::SkippedTargets,
            format!("{count} listing line(s) could not be parsed and were skipped"),
        )
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A local or remote scratch file was left behind.
    Cleanup,
    /// Profile or last-used state could not be persisted.
    Store,
    /// The session did not close cleanly.
    SshDisconnect,
    /// A registry refresh dropped unparseable listing lines.
    SkippedTargets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_in_order() {
        let mut diag = Diagnostics::default();
        assert!(!diag.has_warnings());

        diag.warn(Warning::store("state.json is read-only"));
        diag.cleanup(["failed to remove /tmp/x.tar.gz", "failed to remove /tmp/y"]);

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 3);
        assert_eq!(diag.warnings()[1].kind, WarningKind::Cleanup);
    }

    #[test]
    fn constructors_pick_the_kind() {
        assert_eq!(Warning::cleanup("x").kind, WarningKind::Cleanup);
        assert_eq!(Warning::ssh_disconnect("x").kind, WarningKind::SshDisconnect);

        let skipped = Warning::skipped_targets(2);
        assert_eq!(skipped.kind, WarningKind::SkippedTargets);
        assert!(skipped.message.starts_with("2 listing"));
    }
}
