// ABOUTME: ConfigStore backed by a JSON file in the user's state directory.
// ABOUTME: Writes go through a temp file and rename so a crash never truncates state.

use super::{ConfigStore, DatabaseCredentials, DeploySettings, Result, StoreError, StoreState};
use crate::config::ConnectionProfile;
use crate::types::{Environment, TargetId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const STATE_FILENAME: &str = "state.json";

/// `$XDG_STATE_HOME/dockside`, falling back to `~/.local/state/dockside`.
pub fn default_state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir).join("dockside"));
        }
    }
    let home = std::env::var("HOME")
        .map_err(|_| StoreError::NoStateDir("neither XDG_STATE_HOME nor HOME is set".to_string()))?;
    Ok(PathBuf::from(home).join(".local/state/dockside"))
}

pub struct JsonStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonStore {
    /// Open (or create) the store in `dir`. An unreadable file starts empty.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(STATE_FILENAME);
        let state = load(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        f(&self.state.lock())
    }

    /// Apply `f` to a copy, persist it, then publish it.
    fn update<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> Result<T> {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        let out = f(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_vec_pretty(state)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        debug!(path = %self.path.display(), "Saved state");
        Ok(())
    }
}

fn load(path: &Path) -> Result<StoreState> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoreState::default()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    match serde_json::from_slice(&content) {
        Ok(state) => Ok(state),
        Err(e) => {
            let kept = set_aside(path)?;
            warn!(
                path = %path.display(),
                kept = %kept.display(),
                error = %e,
                "State file is corrupt, moved it aside and starting empty"
            );
            Ok(StoreState::default())
        }
    }
}

/// Rename an unreadable state file so the next write cannot replace it.
fn set_aside(path: &Path) -> Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S%.3f");
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{stamp}"));
    let kept = path.with_file_name(name);
    std::fs::rename(path, &kept).map_err(|source| StoreError::Write {
        path: kept.clone(),
        source,
    })?;
    Ok(kept)
}

impl ConfigStore for JsonStore {
    fn profiles(&self) -> Result<Vec<ConnectionProfile>> {
        Ok(self.read(StoreState::profiles_by_recency))
    }

    fn save_profile(&self, profile: ConnectionProfile) -> Result<()> {
        self.update(|s| s.upsert_profile(profile))
    }

    fn remove_profile(&self, name: &str) -> Result<bool> {
        self.update(|s| s.remove_profile(name))
    }

    fn touch_profile(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        if self.update(|s| s.touch_profile(name, at))? {
            Ok(())
        } else {
            Err(StoreError::UnknownProfile(name.to_string()))
        }
    }

    fn last_deploy(
        &self,
        target: &TargetId,
        environment: &Environment,
    ) -> Result<Option<DeploySettings>> {
        Ok(self.read(|s| s.last_deploy(target, environment).cloned()))
    }

    fn save_deploy(&self, settings: DeploySettings) -> Result<()> {
        self.update(|s| s.upsert_deploy(settings))
    }

    fn database_credentials(&self, target: &TargetId) -> Result<Option<DatabaseCredentials>> {
        Ok(self.read(|s| s.database_credentials(target).cloned()))
    }

    fn save_database_credentials(&self, credentials: DatabaseCredentials) -> Result<()> {
        self.update(|s| s.upsert_database_credentials(credentials))
    }
}
