// ABOUTME: The injected key-value collaborator for profiles and last-used settings.
// ABOUTME: JSON-file and in-memory implementations share one state model.

mod json;
mod memory;
mod state;

pub use json::{JsonStore, default_state_dir};
pub use memory::MemoryStore;
pub use state::{DatabaseCredentials, DeploySettings, StoreState};

use crate::config::ConnectionProfile;
use crate::types::{Environment, TargetId};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("state directory unavailable: {0}")]
    NoStateDir(String),

    #[error("unknown profile: {0}")]
    UnknownProfile(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persisted settings the engine reads and updates.
///
/// Profiles are read-only to the engine apart from `touch_profile`.
pub trait ConfigStore: Send + Sync {
    /// All profiles, most recently used first.
    fn profiles(&self) -> Result<Vec<ConnectionProfile>>;

    fn profile(&self, name: &str) -> Result<Option<ConnectionProfile>> {
        Ok(self.profiles()?.into_iter().find(|p| p.name == name))
    }

    /// Insert or replace the profile with the same name.
    fn save_profile(&self, profile: ConnectionProfile) -> Result<()>;

    fn remove_profile(&self, name: &str) -> Result<bool>;

    /// Record that a session was opened with `name`.
    fn touch_profile(&self, name: &str, at: DateTime<Utc>) -> Result<()>;

    fn last_deploy(
        &self,
        target: &TargetId,
        environment: &Environment,
    ) -> Result<Option<DeploySettings>>;

    /// Replace the record for the settings' (target, environment).
    fn save_deploy(&self, settings: DeploySettings) -> Result<()>;

    fn database_credentials(&self, target: &TargetId) -> Result<Option<DatabaseCredentials>>;

    fn save_database_credentials(&self, credentials: DatabaseCredentials) -> Result<()>;
}
