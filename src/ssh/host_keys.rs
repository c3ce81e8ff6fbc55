// ABOUTME: Server key verification against known_hosts.
// ABOUTME: Unknown hosts are refused unless the profile opts into trusting the first connection.

use russh::client;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::ssh_key::PublicKey;
use std::path::PathBuf;
use tracing::warn;

/// How server keys are checked.
#[derive(Debug, Clone, Default)]
pub struct HostKeyPolicy {
    /// Accept and record a key for a host not yet in known_hosts.
    pub trust_first_connection: bool,
    /// Alternate known_hosts file; the user's default when `None`.
    pub known_hosts: Option<PathBuf>,
}

enum KnownHost {
    Match,
    Unknown,
    Changed,
}

/// russh handler that applies a [`HostKeyPolicy`] to one host.
pub struct HostKeyVerifier {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl HostKeyVerifier {
    pub(crate) fn new(host: &str, port: u16, policy: HostKeyPolicy) -> Self {
        Self {
            host: host.to_string(),
            port,
            policy,
        }
    }

    fn lookup(&self, key: &PublicKey) -> KnownHost {
        let checked = match &self.policy.known_hosts {
            Some(path) => check_known_hosts_path(&self.host, self.port, key, path),
            None => check_known_hosts(&self.host, self.port, key),
        };
        match checked {
            Ok(true) => KnownHost::Match,
            Err(russh::keys::Error::KeyChanged { .. }) => KnownHost::Changed,
            // An unreadable or missing known_hosts file counts as unknown.
            Ok(false) | Err(_) => KnownHost::Unknown,
        }
    }

    fn remember(&self, key: &PublicKey) {
        let learned = match &self.policy.known_hosts {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learned {
            warn!(host = %self.host, error = %e, "Could not record host key");
        }
    }
}

impl client::Handler for HostKeyVerifier {
    type Error = russh::Error;

    async fn check_server_key(&mut self, key: &PublicKey) -> Result<bool, Self::Error> {
        match self.lookup(key) {
            KnownHost::Match => Ok(true),
            KnownHost::Changed => {
                warn!(host = %self.host, port = self.port, "Host key changed; refusing to connect");
                Ok(false)
            }
            KnownHost::Unknown if self.policy.trust_first_connection => {
                warn!(host = %self.host, port = self.port, "Trusting unknown host key on first connection");
                self.remember(key);
                Ok(true)
            }
            KnownHost::Unknown => Ok(false),
        }
    }
}
