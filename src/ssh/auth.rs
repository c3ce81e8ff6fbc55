// ABOUTME: Client authentication for SSH sessions.
// ABOUTME: Turns profile credentials into a russh identity and logs in with it.

use super::error::{Error, Result};
use super::host_keys::HostKeyVerifier;
use russh::client::Handle;
use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg, load_secret_key};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::UnixStream;
use tracing::debug;

/// Key files tried, in order, when a profile names neither a password nor a key.
const FALLBACK_KEYS: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

/// What a connection profile offers to prove the user's identity.
#[derive(Clone, Default)]
pub enum Credentials {
    Password(String),
    KeyFile(PathBuf),
    /// Agent first, then the usual files under `~/.ssh`.
    #[default]
    Discover,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Password(<redacted>)"),
            Credentials::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Credentials::Discover => f.write_str("Discover"),
        }
    }
}

/// A loaded identity, ready to present to the server.
pub(crate) enum Identity {
    Password(String),
    Agent(AgentClient<UnixStream>),
    Key(Arc<PrivateKey>),
}

impl Identity {
    pub(crate) async fn load(credentials: &Credentials) -> Result<Self> {
        match credentials {
            Credentials::Password(password) => Ok(Identity::Password(password.clone())),
            Credentials::KeyFile(path) => load_key(path).map(Identity::Key),
            Credentials::Discover => Self::discover().await,
        }
    }

    async fn discover() -> Result<Self> {
        match AgentClient::connect_env().await {
            Ok(agent) => return Ok(Identity::Agent(agent)),
            Err(e) => debug!(error = %e, "No SSH agent; looking for key files"),
        }

        let home = std::env::var_os("HOME").ok_or_else(|| {
            Error::AgentUnavailable("no SSH agent and HOME is not set".to_string())
        })?;
        let ssh_dir = PathBuf::from(home).join(".ssh");

        FALLBACK_KEYS
            .iter()
            .map(|name| ssh_dir.join(name))
            .find_map(|path| load_key(&path).ok())
            .map(Identity::Key)
            .ok_or_else(|| {
                Error::AgentUnavailable(format!(
                    "no SSH agent and no usable key in {}",
                    ssh_dir.display()
                ))
            })
    }

    /// Present this identity for `user`; a rejection is `AuthenticationFailed`.
    pub(crate) async fn login(self, handle: &mut Handle<HostKeyVerifier>, user: &str) -> Result<()> {
        let accepted = match self {
            Identity::Password(password) => handle
                .authenticate_password(user, password)
                .await?
                .success(),
            Identity::Key(key) => {
                let hash = handle.best_supported_rsa_hash().await?.flatten();
                handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash))
                    .await?
                    .success()
            }
            Identity::Agent(mut agent) => {
                let keys = agent.request_identities().await.map_err(|e| {
                    Error::AgentUnavailable(format!("agent refused to list keys: {e}"))
                })?;
                let mut accepted = false;
                for key in keys {
                    let result = handle
                        .authenticate_publickey_with(user, key, None, &mut agent)
                        .await;
                    if matches!(result, Ok(ref r) if r.success()) {
                        accepted = true;
                        break;
                    }
                }
                accepted
            }
        };

        if accepted {
            Ok(())
        } else {
            Err(Error::AuthenticationFailed)
        }
    }
}

fn load_key(path: &Path) -> Result<Arc<PrivateKey>> {
    load_secret_key(path, None)
        .map(Arc::new)
        .map_err(|e| Error::KeyLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_passwords() {
        let shown = format!("{:?}", Credentials::Password("hunter2".to_string()));
        assert!(!shown.contains("hunter2"));
    }

    #[tokio::test]
    async fn missing_key_file_names_the_path() {
        let err = Identity::load(&Credentials::KeyFile(PathBuf::from("/nonexistent/id_test")))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/id_test"));
    }
}
