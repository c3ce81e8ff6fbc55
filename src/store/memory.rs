// ABOUTME: In-memory ConfigStore for tests and throwaway sessions.
// ABOUTME: Same update rules as the JSON store, nothing persisted.

use super::{ConfigStore, DatabaseCredentials, DeploySettings, Result, StoreError, StoreState};
use crate::config::ConnectionProfile;
use crate::types::{Environment, TargetId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Copy of everything stored so far.
    pub fn snapshot(&self) -> StoreState {
        self.state.lock().clone()
    }
}

impl ConfigStore for MemoryStore {
    fn profiles(&self) -> Result<Vec<ConnectionProfile>> {
        Ok(self.state.lock().profiles_by_recency())
    }

    fn save_profile(&self, profile: ConnectionProfile) -> Result<()> {
        self.state.lock().upsert_profile(profile);
        Ok(())
    }

    fn remove_profile(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().remove_profile(name))
    }

    fn touch_profile(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        if self.state.lock().touch_profile(name, at) {
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
        Ok(self.state.lock().last_deploy(target, environment).cloned())
    }

    fn save_deploy(&self, settings: DeploySettings) -> Result<()> {
        self.state.lock().upsert_deploy(settings);
        Ok(())
    }

    fn database_credentials(&self, target: &TargetId) -> Result<Option<DatabaseCredentials>> {
        Ok(self.state.lock().database_credentials(target).cloned())
    }

    fn save_database_credentials(&self, credentials: DatabaseCredentials) -> Result<()> {
        self.state.lock().upsert_database_credentials(credentials);
        Ok(())
    }
}
