// ABOUTME: Runs one pipeline for one target from claim to terminal stage.
// ABOUTME: Owns job exclusivity, scratch cleanup, and remembering last-used settings.

use super::error::{PipelineError, Result};
use super::job::{DeployOverrides, PipelineJob};
use super::jobs::JobRegistry;
use super::scratch::Scratch;
use super::stage::PipelineStage;
use super::transitions::{Pipeline, TransitionResult};
use crate::config::ConsoleConfig;
use crate::events::EventSink;
use crate::runtime::ContainerCli;
use crate::ssh::RemoteShell;
use crate::store::ConfigStore;
use crate::types::{Environment, Operation, TargetId};
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A pipeline that reached `Success`.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub target: TargetId,
    pub environment: Environment,
    pub operation: Operation,
    pub bytes_transferred: Option<u64>,
    pub duration: Duration,
    /// Non-fatal problems, such as scratch files that could not be removed.
    pub warnings: Vec<String>,
}

/// A pipeline that ended in `Failure` or `Cancelled`.
#[derive(Debug)]
pub struct PipelineFailure {
    /// Stage that was running when the pipeline stopped.
    pub stage: PipelineStage,
    pub error: PipelineError,
    pub warnings: Vec<String>,
}

impl PipelineFailure {
    /// `Cancelled` or `Failure`.
    pub fn terminal(&self) -> PipelineStage {
        if self.error.is_cancelled() {
            PipelineStage::Cancelled
        } else {
            PipelineStage::Failure
        }
    }
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} during {}", self.error, self.stage)
    }
}

impl std::error::Error for PipelineFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub struct PipelineRunner {
    shell: Arc<dyn RemoteShell>,
    cli: ContainerCli,
    store: Arc<dyn ConfigStore>,
    config: Arc<ConsoleConfig>,
    allow_list: Vec<Regex>,
    jobs: JobRegistry,
}

impl PipelineRunner {
    pub fn new(
        shell: Arc<dyn RemoteShell>,
        cli: ContainerCli,
        store: Arc<dyn ConfigStore>,
        config: Arc<ConsoleConfig>,
    ) -> Result<Self> {
        let allow_list = config
            .activation
            .compile()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        Ok(Self {
            shell,
            cli,
            store,
            config,
            allow_list,
            jobs: JobRegistry::new(),
        })
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub(crate) fn shell(&self) -> &dyn RemoteShell {
        self.shell.as_ref()
    }

    pub(crate) fn cli(&self) -> ContainerCli {
        self.cli
    }

    pub(crate) fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub(crate) fn allow_list(&self) -> &[Regex] {
        &self.allow_list
    }

    /// Build a job from overrides, remembered settings and config.
    pub fn resolve(
        &self,
        target: &TargetId,
        operation: &Operation,
        profile: &str,
        overrides: &DeployOverrides,
    ) -> Result<PipelineJob> {
        let environment = operation
            .environment()
            .ok_or_else(|| PipelineError::NotAPipeline(operation.to_string()))?;
        let last_used = match self.store.last_deploy(target, environment) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Could not read last-used deploy settings");
                None
            }
        };
        PipelineJob::resolve(
            target.clone(),
            operation.clone(),
            profile,
            overrides,
            last_used.as_ref(),
            &self.config.environment(environment),
        )
    }

    /// Run `job` to a terminal stage.
    ///
    /// A second run for the same target and environment while this one is
    /// active fails immediately with `JobInProgress`.
    pub async fn run(
        &self,
        job: PipelineJob,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> std::result::Result<PipelineReport, PipelineFailure> {
        let _guard = self
            .jobs
            .claim(&job.target, &job.environment)
            .map_err(|error| PipelineFailure {
                stage: PipelineStage::Idle,
                error,
                warnings: Vec::new(),
            })?;

        let started = Instant::now();
        info!(target_id = %job.target, operation = %job.operation, "Pipeline started");

        let mut scratch = None;
        let result = self.drive(&job, events, cancel, &mut scratch).await;
        let mut warnings = match scratch {
            Some(scratch) => scratch.cleanup(self.shell.as_ref()).await,
            None => Vec::new(),
        };

        match result {
            Ok(bytes_transferred) => {
                if let Some(settings) = job.deploy_settings() {
                    if let Err(e) = self.store.save_deploy(settings) {
                        warn!(error = %e, "Could not save last-used deploy settings");
                        warnings.push(format!("could not save deploy settings: {e}"));
                    }
                }
                events.stage(&job.target, &job.environment, PipelineStage::Success);
                info!(target_id = %job.target, operation = %job.operation, "Pipeline succeeded");
                Ok(PipelineReport {
                    target: job.target,
                    environment: job.environment,
                    operation: job.operation,
                    bytes_transferred,
                    duration: started.elapsed(),
                    warnings,
                })
            }
            Err((stage, error)) => {
                let failure = PipelineFailure {
                    stage,
                    error,
                    warnings,
                };
                events.stage(&job.target, &job.environment, failure.terminal());
                warn!(target_id = %job.target, operation = %job.operation, "Pipeline {}", failure);
                Err(failure)
            }
        }
    }

    async fn drive(
        &self,
        job: &PipelineJob,
        events: &EventSink,
        cancel: &CancellationToken,
        scratch: &mut Option<Scratch>,
    ) -> TransitionResult<Option<u64>> {
        let idle = Pipeline::new(self, job, events, cancel);

        if !job.operation.includes_deploy() {
            return Ok(idle.build().await?.finish());
        }

        let scratch = scratch.insert(Scratch::new().map_err(|e| {
            (
                PipelineStage::Packaging,
                PipelineError::PackagingFailed {
                    path: "scratch directory".to_string(),
                    reason: e.to_string(),
                },
            )
        })?);

        let packaged = if job.operation.includes_build() {
            idle.build().await?.package(scratch).await?
        } else {
            idle.package(scratch).await?
        };
        let activated = packaged.transfer(scratch).await?.activate().await?;
        Ok(activated.finish())
    }
}
