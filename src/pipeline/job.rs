// ABOUTME: A single pipeline request with every setting resolved up front.
// ABOUTME: Precedence: explicit overrides, then last-used settings, then config defaults.

use super::error::{PipelineError, Result};
use crate::config::EnvironmentConfig;
use crate::store::DeploySettings;
use crate::types::{Environment, Operation, TargetId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-run replacements for the remembered deploy paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeployOverrides {
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub remote_path: Option<String>,
}

/// Remote build command and its working directory inside the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub command: String,
    pub workdir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub target: TargetId,
    pub operation: Operation,
    pub environment: Environment,
    /// Present when the operation builds.
    pub build: Option<BuildStep>,
    /// Present when the operation deploys.
    pub local_path: Option<PathBuf>,
    pub remote_path: Option<String>,
    pub activate: String,
    /// Connection profile the job runs through.
    pub profile: String,
    pub started_at: DateTime<Utc>,
}

impl PipelineJob {
    pub fn resolve(
        target: TargetId,
        operation: Operation,
        profile: &str,
        overrides: &DeployOverrides,
        last_used: Option<&DeploySettings>,
        settings: &EnvironmentConfig,
    ) -> Result<Self> {
        let environment = operation
            .environment()
            .cloned()
            .ok_or_else(|| PipelineError::NotAPipeline(operation.to_string()))?;

        let missing = |what| PipelineError::MissingSettings {
            what,
            target: target.clone(),
            environment: environment.clone(),
        };

        let build = if operation.includes_build() {
            let command = settings.build.clone().ok_or_else(|| missing("build command"))?;
            Some(BuildStep {
                command,
                workdir: settings.workdir.clone(),
            })
        } else {
            None
        };

        let (local_path, remote_path) = if operation.includes_deploy() {
            let local = overrides
                .local_path
                .clone()
                .or_else(|| last_used.map(|s| s.local_path.clone()))
                .or_else(|| settings.local_path.clone())
                .ok_or_else(|| missing("local path"))?;
            let remote = overrides
                .remote_path
                .clone()
                .or_else(|| last_used.map(|s| s.remote_path.clone()))
                .or_else(|| settings.remote_path.clone())
                .ok_or_else(|| missing("remote path"))?;
            (Some(local), Some(remote))
        } else {
            (None, None)
        };

        Ok(Self {
            target,
            operation,
            environment,
            build,
            local_path,
            remote_path,
            activate: settings.activate_template().to_string(),
            profile: profile.to_string(),
            started_at: Utc::now(),
        })
    }

    /// Settings to remember after a successful deploy.
    pub fn deploy_settings(&self) -> Option<DeploySettings> {
        Some(DeploySettings {
            target: self.target.clone(),
            environment: self.environment.clone(),
            local_path: self.local_path.clone()?,
            remote_path: self.remote_path.clone()?,
            profile: self.profile.clone(),
            last_used: Utc::now(),
        })
    }
}
