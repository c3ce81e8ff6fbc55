// ABOUTME: Stage transitions for a pipeline run using the type state pattern.
// ABOUTME: Each method consumes the pipeline and returns the next state on success.

use super::activation::{ActivationVars, render, unexpected_stderr};
use super::error::PipelineError;
use super::job::PipelineJob;
use super::package::package_directory;
use super::runner::PipelineRunner;
use super::scratch::Scratch;
use super::stage::{
    Activated, Built, Finishable, Idle, Packaged, PipelineStage, ReadyToPackage, Transferred,
};
use crate::events::{EventSink, LogKind};
use crate::progress::ProgressTracker;
use crate::ssh::{LineStream, StreamExit, StreamingExec};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Stderr lines kept for a failed build's error.
const STDERR_TAIL: usize = 50;

/// On failure, the stage that failed and why.
pub type TransitionResult<T> = Result<T, (PipelineStage, PipelineError)>;

/// One pipeline run, parameterized by the stage it has reached.
pub struct Pipeline<'r, S> {
    runner: &'r PipelineRunner,
    job: &'r PipelineJob,
    events: &'r EventSink,
    cancel: &'r CancellationToken,
    state: S,
}

impl<'r> Pipeline<'r, Idle> {
    pub fn new(
        runner: &'r PipelineRunner,
        job: &'r PipelineJob,
        events: &'r EventSink,
        cancel: &'r CancellationToken,
    ) -> Self {
        Pipeline {
            runner,
            job,
            events,
            cancel,
            state: Idle,
        }
    }

    /// Run the build command inside the target, streaming its output.
    pub async fn build(self) -> TransitionResult<Pipeline<'r, Built>> {
        let stage = PipelineStage::Building;
        self.enter(stage)?;

        let step = self.job.build.as_ref().ok_or_else(|| {
            (
                stage,
                PipelineError::MissingSettings {
                    what: "build command",
                    target: self.job.target.clone(),
                    environment: self.job.environment.clone(),
                },
            )
        })?;
        let command = self.runner.cli().exec_in(
            &self.job.target,
            step.workdir.as_deref(),
            &step.command,
        );
        debug!(%command, "Starting build");

        let StreamingExec {
            mut stdout,
            mut stderr,
            cancel: handle,
            mut completion,
        } = self
            .runner
            .shell()
            .exec_streaming(&command)
            .await
            .map_err(|e| (stage, PipelineError::from(e)))?;

        let mut tail = VecDeque::with_capacity(STDERR_TAIL);
        let mut ticker = tokio::time::interval(self.runner.config().poll_interval);

        let result = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    handle.cancel();
                    let _ = (&mut completion).await;
                    return Err((stage, PipelineError::Cancelled));
                }
                result = &mut completion => {
                    self.forward(&mut stdout, &mut stderr, &mut tail);
                    break result;
                }
                _ = ticker.tick() => self.forward(&mut stdout, &mut stderr, &mut tail),
            }
        };

        match result {
            Ok(StreamExit::Exited(0)) => Ok(self.transition(Built)),
            Ok(StreamExit::Exited(exit_code)) => Err((
                stage,
                PipelineError::BuildFailed {
                    exit_code,
                    stderr: Vec::from(tail).join("\n"),
                },
            )),
            Ok(StreamExit::Cancelled) => Err((stage, PipelineError::Cancelled)),
            Err(e) => Err((stage, PipelineError::from(e))),
        }
    }

    fn forward(
        &self,
        stdout: &mut LineStream,
        stderr: &mut LineStream,
        tail: &mut VecDeque<String>,
    ) {
        for line in stdout.drain() {
            if !line.trim().is_empty() {
                self.events.log(&self.job.target, LogKind::Normal, line);
            }
        }
        for line in stderr.drain() {
            if line.trim().is_empty() {
                continue;
            }
            if tail.len() == STDERR_TAIL {
                tail.pop_front();
            }
            tail.push_back(line.clone());
            self.events.log(&self.job.target, LogKind::Error, line);
        }
    }
}

impl<'r, S: ReadyToPackage> Pipeline<'r, S> {
    /// Archive the local directory into the run's scratch directory.
    pub async fn package(self, scratch: &Scratch) -> TransitionResult<Pipeline<'r, Packaged>> {
        let stage = PipelineStage::Packaging;
        self.enter(stage)?;

        let local = self.job.local_path.as_ref().ok_or_else(|| {
            (
                stage,
                PipelineError::MissingSettings {
                    what: "local path",
                    target: self.job.target.clone(),
                    environment: self.job.environment.clone(),
                },
            )
        })?;
        let archive = scratch.local_dir().join(format!(
            "{}-{}.tar.gz",
            self.job.target, self.job.environment
        ));
        let size = package_directory(local, &archive)
            .await
            .map_err(|e| (stage, e))?;
        info!(archive = %archive.display(), size, "Packaged {}", local.display());

        Ok(self.transition(Packaged { archive, size }))
    }
}

impl<'r> Pipeline<'r, Packaged> {
    /// Push the archive to the host, reporting progress.
    pub async fn transfer(
        self,
        scratch: &mut Scratch,
    ) -> TransitionResult<Pipeline<'r, Transferred>> {
        let stage = PipelineStage::Transferring;
        self.enter(stage)?;

        let remote_archive = format!(
            "/tmp/dockside-{}-{}-{}.tar.gz",
            self.job.target,
            self.job.environment,
            chrono::Utc::now().timestamp_millis()
        );
        scratch.track_remote(remote_archive.clone());

        let mut tracker = ProgressTracker::new(Some(self.state.size));
        let result = {
            let events = self.events;
            let target = &self.job.target;
            let mut on_progress = |bytes: u64| {
                if let Some(snapshot) = tracker.record(bytes) {
                    events.progress(target, snapshot);
                }
            };
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err((stage, PipelineError::Cancelled)),
                result = self.runner.shell().upload(
                    &self.state.archive,
                    &remote_archive,
                    &mut on_progress,
                ) => result,
            }
        };

        let bytes = result.map_err(|e| (stage, transfer_error(e)))?;
        self.events.progress(&self.job.target, tracker.finish());
        if bytes != self.state.size {
            return Err((
                stage,
                PipelineError::TransferFailed(format!(
                    "sent {bytes} of {} bytes",
                    self.state.size
                )),
            ));
        }

        Ok(self.transition(Transferred {
            remote_archive,
            bytes,
        }))
    }
}

impl<'r> Pipeline<'r, Transferred> {
    /// Run the activation command; unexpected stderr fails the stage.
    pub async fn activate(self) -> TransitionResult<Pipeline<'r, Activated>> {
        let stage = PipelineStage::Activating;
        self.enter(stage)?;

        let remote_path = self.job.remote_path.as_deref().ok_or_else(|| {
            (
                stage,
                PipelineError::MissingSettings {
                    what: "remote path",
                    target: self.job.target.clone(),
                    environment: self.job.environment.clone(),
                },
            )
        })?;
        let command = render(
            &self.job.activate,
            &ActivationVars {
                archive: &self.state.remote_archive,
                remote_path,
                target: &self.job.target,
                runtime: self.runner.cli().runtime(),
            },
        );
        debug!(%command, "Activating");

        let output = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err((stage, PipelineError::Cancelled)),
            output = self.runner.shell().exec(&command) => output,
        };
        let output = output.map_err(|e| (stage, PipelineError::from(e)))?;

        for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
            self.events.log(&self.job.target, LogKind::Normal, line);
        }
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            self.events.log(&self.job.target, LogKind::Error, line);
        }

        if !output.success() {
            return Err((
                stage,
                PipelineError::ActivationFailed {
                    exit_code: output.exit_code,
                    stderr: output.stderr,
                },
            ));
        }
        let unexpected = unexpected_stderr(&output.stderr, self.runner.allow_list());
        if !unexpected.is_empty() {
            return Err((
                stage,
                PipelineError::ActivationFailed {
                    exit_code: output.exit_code,
                    stderr: unexpected.join("\n"),
                },
            ));
        }

        let bytes = self.state.bytes;
        Ok(self.transition(Activated { bytes }))
    }
}

impl<S: Finishable> Pipeline<'_, S> {
    /// Bytes shipped by this run, if it deployed.
    pub fn finish(self) -> Option<u64> {
        self.state.bytes_transferred()
    }
}

impl<'r, S> Pipeline<'r, S> {
    fn transition<T>(self, state: T) -> Pipeline<'r, T> {
        Pipeline {
            runner: self.runner,
            job: self.job,
            events: self.events,
            cancel: self.cancel,
            state,
        }
    }

    /// Announce `stage`, refusing to start it if cancellation was requested.
    fn enter(&self, stage: PipelineStage) -> TransitionResult<()> {
        if self.cancel.is_cancelled() {
            return Err((stage, PipelineError::Cancelled));
        }
        info!(
            target_id = %self.job.target,
            environment = %self.job.environment,
            "Pipeline {}",
            stage
        );
        self.events
            .stage(&self.job.target, &self.job.environment, stage);
        Ok(())
    }
}

fn transfer_error(e: crate::ssh::Error) -> PipelineError {
    match e {
        crate::ssh::Error::Transfer(reason) => PipelineError::TransferFailed(reason),
        crate::ssh::Error::Io(io) => PipelineError::TransferFailed(io.to_string()),
        other => PipelineError::Remote(other),
    }
}
