// ABOUTME: Serializable store contents and the update rules shared by every backend.
// ABOUTME: Each record kind is keyed so a save replaces rather than appends.

use crate::config::ConnectionProfile;
use crate::types::{Environment, TargetId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Last-used pipeline settings for one (target, environment).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeploySettings {
    pub target: TargetId,
    pub environment: Environment,
    pub local_path: PathBuf,
    pub remote_path: String,
    /// Profile the pipeline ran through.
    pub profile: String,
    pub last_used: DateTime<Utc>,
}

#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseCredentials {
    pub target: TargetId,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("target", &self.target)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreState {
    #[serde(default)]
    pub profiles: Vec<ConnectionProfile>,
    #[serde(default)]
    pub deploys: Vec<DeploySettings>,
    #[serde(default)]
    pub databases: Vec<DatabaseCredentials>,
}

impl StoreState {
    pub fn profiles_by_recency(&self) -> Vec<ConnectionProfile> {
        let mut profiles = self.profiles.clone();
        profiles.sort_by(|a, b| b.last_used.cmp(&a.last_used).then(a.name.cmp(&b.name)));
        profiles
    }

    pub fn upsert_profile(&mut self, profile: ConnectionProfile) {
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    pub fn remove_profile(&mut self, name: &str) -> bool {
        let before = self.profiles.len();
        self.profiles.retain(|p| p.name != name);
        self.profiles.len() != before
    }

    pub fn touch_profile(&mut self, name: &str, at: DateTime<Utc>) -> bool {
        match self.profiles.iter_mut().find(|p| p.name == name) {
            Some(profile) => {
                profile.last_used = Some(at);
                true
            }
            None => false,
        }
    }

    pub fn last_deploy(&self, target: &TargetId, environment: &Environment) -> Option<&DeploySettings> {
        self.deploys
            .iter()
            .find(|d| &d.target == target && &d.environment == environment)
    }

    pub fn upsert_deploy(&mut self, settings: DeploySettings) {
        self.deploys
            .retain(|d| !(d.target == settings.target && d.environment == settings.environment));
        self.deploys.push(settings);
    }

    pub fn database_credentials(&self, target: &TargetId) -> Option<&DatabaseCredentials> {
        self.databases.iter().find(|c| &c.target == target)
    }

    pub fn upsert_database_credentials(&mut self, credentials: DatabaseCredentials) {
        self.databases.retain(|c| c.target != credentials.target);
        self.databases.push(credentials);
    }
}
