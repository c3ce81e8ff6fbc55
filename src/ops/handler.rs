// ABOUTME: The production operation handler: direct commands, log follows, pipelines, exports.
// ABOUTME: Lifecycle and inspect run as blocking commands; build and deploy go to the pipeline runner.

use super::error::{
    CancelledSnafu, CommandFailedSnafu, ExportSnafu, OperationError, PipelineSnafu, RemoteSnafu,
};
use super::export::{ExportError, ExportRequest, run_export};
use super::{OperationContext, OperationHandler, OperationSummary};
use crate::config::ConsoleConfig;
use crate::events::LogKind;
use crate::pipeline::{PipelineFailure, PipelineRunner, PipelineStage};
use crate::runtime::ContainerCli;
use crate::ssh::{RemoteShell, StreamExit, StreamingExec};
use crate::store::ConfigStore;
use crate::types::{LifecycleAction, Operation, TargetId};
use async_trait::async_trait;
use snafu::ResultExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub struct ConsoleHandler {
    shell: Arc<dyn RemoteShell>,
    cli: ContainerCli,
    runner: Arc<PipelineRunner>,
    store: Arc<dyn ConfigStore>,
    config: Arc<ConsoleConfig>,
    profile: String,
}

impl ConsoleHandler {
    pub fn new(
        shell: Arc<dyn RemoteShell>,
        cli: ContainerCli,
        runner: Arc<PipelineRunner>,
        store: Arc<dyn ConfigStore>,
        config: Arc<ConsoleConfig>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            shell,
            cli,
            runner,
            store,
            config,
            profile: profile.into(),
        }
    }

    pub fn runner(&self) -> &Arc<PipelineRunner> {
        &self.runner
    }

    async fn lifecycle(
        &self,
        target: &TargetId,
        action: LifecycleAction,
        ctx: &OperationContext,
    ) -> Result<Option<String>, OperationError> {
        self.direct(target, action.verb(), &self.cli.lifecycle(action, target), ctx)
            .await
            .map(|_| None)
    }

    async fn inspect(
        &self,
        target: &TargetId,
        ctx: &OperationContext,
    ) -> Result<Option<String>, OperationError> {
        self.direct(target, "inspect", &self.cli.inspect(target), ctx)
            .await
            .map(Some)
    }

    /// Run one blocking command, forwarding its output as log lines.
    async fn direct(
        &self,
        target: &TargetId,
        operation: &str,
        command: &str,
        ctx: &OperationContext,
    ) -> Result<String, OperationError> {
        debug!(%command, "Running");
        let output = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                return CancelledSnafu { target: target.clone(), operation }.fail();
            }
            output = self.shell.exec(command) => output,
        };
        let output = output.context(RemoteSnafu {
            target: target.clone(),
            operation,
        })?;

        for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
            ctx.events.log(target, LogKind::Normal, line);
        }
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            ctx.events.log(target, LogKind::Error, line);
        }

        if !output.success() {
            return CommandFailedSnafu {
                target: target.clone(),
                operation,
                exit_code: output.exit_code,
                stderr: output.stderr,
            }
            .fail();
        }
        Ok(output.stdout)
    }

    /// Follow logs until the container stops, the window elapses, or cancellation.
    async fn follow_logs(
        &self,
        target: &TargetId,
        ctx: &OperationContext,
    ) -> Result<(), OperationError> {
        let command = self.cli.logs(target, self.config.logs.tail, true);
        let StreamingExec {
            mut stdout,
            mut stderr,
            cancel: handle,
            mut completion,
        } = self
            .shell
            .exec_streaming(&command)
            .await
            .context(RemoteSnafu {
                target: target.clone(),
                operation: "logs",
            })?;

        let window = async {
            match ctx.follow_window {
                Some(window) => tokio::time::sleep(window).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(window);
        let mut ticker = tokio::time::interval(self.config.poll_interval);

        let forward = |stdout: &mut crate::ssh::LineStream, stderr: &mut crate::ssh::LineStream| {
            for line in stdout.drain() {
                ctx.events.log(target, LogKind::Normal, line);
            }
            for line in stderr.drain() {
                ctx.events.log(target, LogKind::Error, line);
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    handle.cancel();
                    let _ = (&mut completion).await;
                    return CancelledSnafu { target: target.clone(), operation: "logs" }.fail();
                }
                _ = &mut window => {
                    forward(&mut stdout, &mut stderr);
                    handle.cancel();
                    let _ = (&mut completion).await;
                    info!(target_id = %target, "Log follow window elapsed");
                    return Ok(());
                }
                result = &mut completion => {
                    forward(&mut stdout, &mut stderr);
                    let exit = result.context(RemoteSnafu {
                        target: target.clone(),
                        operation: "logs",
                    })?;
                    return match exit {
                        StreamExit::Exited(0) | StreamExit::Cancelled => Ok(()),
                        StreamExit::Exited(exit_code) => CommandFailedSnafu {
                            target: target.clone(),
                            operation: "logs",
                            exit_code,
                            stderr: String::new(),
                        }
                        .fail(),
                    };
                }
                _ = ticker.tick() => forward(&mut stdout, &mut stderr),
            }
        }
    }

    async fn pipeline(
        &self,
        target: &TargetId,
        operation: &Operation,
        ctx: &OperationContext,
    ) -> Result<Option<u64>, OperationError> {
        let job = self
            .runner
            .resolve(target, operation, &self.profile, &ctx.overrides)
            .map_err(|error| PipelineFailure {
                stage: PipelineStage::Idle,
                error,
                warnings: Vec::new(),
            })
            .context(PipelineSnafu {
                target: target.clone(),
                operation: operation.to_string(),
            })?;

        let report = self
            .runner
            .run(job, &ctx.events, &ctx.cancel)
            .await
            .context(PipelineSnafu {
                target: target.clone(),
                operation: operation.to_string(),
            })?;
        Ok(report.bytes_transferred)
    }

    async fn export(
        &self,
        target: &TargetId,
        database: &str,
        ctx: &OperationContext,
        summary: &mut OperationSummary,
    ) -> Result<(), OperationError> {
        let context = || ExportSnafu {
            target: target.clone(),
            database,
        };
        let credentials = self
            .store
            .database_credentials(target)
            .map_err(ExportError::from)
            .and_then(|c| c.ok_or_else(|| ExportError::MissingCredentials(target.clone())))
            .context(context())?;

        let request = ExportRequest {
            shell: self.shell.as_ref(),
            cli: self.cli,
            target,
            database,
            credentials: &credentials,
            client: &self.config.export.client,
            local_dir: &self.config.export.local_dir,
            pty: self.config.pty_request(),
            exchange: self.config.exchange_settings(),
        };
        let outcome = run_export(&request, &ctx.events, &ctx.cancel)
            .await
            .context(context())?;

        let mut credentials = credentials;
        credentials.last_used = Some(chrono::Utc::now());
        if let Err(e) = self.store.save_database_credentials(credentials) {
            summary
                .warnings
                .push(format!("could not record credential use: {e}"));
        }

        summary.bytes_transferred = Some(outcome.bytes);
        summary.local_path = Some(outcome.local_path);
        summary.warnings.extend(outcome.warnings);
        Ok(())
    }
}

#[async_trait]
impl OperationHandler for ConsoleHandler {
    async fn execute(
        &self,
        target: &TargetId,
        operation: &Operation,
        ctx: &OperationContext,
    ) -> Result<OperationSummary, OperationError> {
        let started = Instant::now();
        let mut summary = OperationSummary::new(target.clone(), operation.clone(), started.elapsed());

        match operation {
            Operation::Lifecycle(action) => {
                summary.output = self.lifecycle(target, *action, ctx).await?;
            }
            Operation::Inspect => {
                summary.output = self.inspect(target, ctx).await?;
            }
            Operation::LogFollow => self.follow_logs(target, ctx).await?,
            Operation::Build(_) | Operation::Deploy(_) | Operation::BuildAndDeploy(_) => {
                summary.bytes_transferred = self.pipeline(target, operation, ctx).await?;
            }
            Operation::DataExport(database) => {
                self.export(target, database, ctx, &mut summary).await?;
            }
        }

        summary.duration = started.elapsed();
        Ok(summary)
    }
}
