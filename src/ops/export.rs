// ABOUTME: Database export through an interactive shell inside the target.
// ABOUTME: Dumps to container scratch, copies to the host, then pulls the file with progress.

use crate::error::ErrorKind;
use crate::events::{EventSink, LogKind};
use crate::progress::ProgressTracker;
use crate::runtime::parse::{is_access_denied, parse_size};
use crate::runtime::{ContainerCli, quote, remove_file, stat_size};
use crate::ssh::{ExchangeSettings, Interactive, PtyRequest, RemoteShell, exchange};
use crate::store::DatabaseCredentials;
use crate::types::TargetId;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no database credentials stored for {0}")]
    MissingCredentials(TargetId),

    #[error("credential store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("database rejected the credentials: {}", output.trim())]
    AccessDenied { output: String },

    #[error("dump client exited with code {exit_code}: {}", output.trim())]
    DumpFailed { exit_code: i32, output: String },

    #[error("dump produced no data")]
    EmptyDump,

    #[error(transparent)]
    Remote(#[from] crate::ssh::Error),

    #[error("failed to create {path}: {source}")]
    LocalFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("export cancelled")]
    Cancelled,
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::MissingCredentials(_) => ErrorKind::Config,
            ExportError::Store(_) => ErrorKind::Store,
            ExportError::AccessDenied { .. }
            | ExportError::DumpFailed { .. }
            | ExportError::EmptyDump => ErrorKind::Remote,
            ExportError::Remote(e) => e.kind(),
            ExportError::LocalFile { .. } => ErrorKind::Transfer,
            ExportError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Everything one export needs.
pub struct ExportRequest<'a> {
    pub shell: &'a dyn RemoteShell,
    pub cli: ContainerCli,
    pub target: &'a TargetId,
    pub database: &'a str,
    pub credentials: &'a DatabaseCredentials,
    /// Dump client binary inside the target.
    pub client: &'a str,
    pub local_dir: &'a Path,
    pub pty: PtyRequest,
    pub exchange: ExchangeSettings,
}

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub local_path: PathBuf,
    pub bytes: u64,
    pub warnings: Vec<String>,
}

/// Run the export; host scratch is removed whatever the outcome.
pub async fn run_export(
    request: &ExportRequest<'_>,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<ExportOutcome, ExportError> {
    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let container_path = format!("/tmp/dockside-{}-{}.sql", request.database, stamp);
    let host_path = format!(
        "/tmp/dockside-{}-{}-{}.sql",
        request.target, request.database, stamp
    );
    let local_path = request
        .local_dir
        .join(format!("{}-{}-{}.sql", request.target, request.database, stamp));

    let result = export_steps(
        request,
        events,
        cancel,
        &container_path,
        &host_path,
        &local_path,
    )
    .await;

    let mut warnings = Vec::new();
    for command in [
        request.cli.remove_in(request.target, &container_path),
        remove_file(&host_path),
    ] {
        match request.shell.exec(&command).await {
            Ok(output) if output.success() => {}
            Ok(output) => {
                let msg = format!("cleanup `{command}` exited with {}", output.exit_code);
                warn!("{msg}");
                warnings.push(msg);
            }
            Err(e) => {
                let msg = format!("cleanup `{command}` failed: {e}");
                warn!("{msg}");
                warnings.push(msg);
            }
        }
    }

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&local_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %local_path.display(), error = %e, "Could not remove partial dump");
            }
        }
    }

    let bytes = result?;
    info!(path = %local_path.display(), bytes, "Export finished");
    Ok(ExportOutcome {
        local_path,
        bytes,
        warnings,
    })
}

async fn export_steps(
    request: &ExportRequest<'_>,
    events: &EventSink,
    cancel: &CancellationToken,
    container_path: &str,
    host_path: &str,
    local_path: &Path,
) -> Result<u64, ExportError> {
    let mut terminal = request.shell.open_interactive(&request.pty).await?;
    let dumped = dump_in_container(request, terminal.as_mut(), cancel, container_path).await;
    if let Err(e) = terminal.close().await {
        debug!(error = %e, "Closing export terminal failed");
    }
    dumped?;
    check_cancelled(cancel)?;

    request
        .shell
        .exec_checked(&request.cli.copy_out(request.target, container_path, host_path))
        .await?;
    events.log(request.target, LogKind::Normal, format!("Dump copied to {host_path}"));

    let estimate = match request.shell.exec(&stat_size(host_path)).await {
        Ok(output) if output.success() => parse_size(&output.stdout),
        _ => None,
    };
    if estimate == Some(0) {
        return Err(ExportError::EmptyDump);
    }
    check_cancelled(cancel)?;

    if let Some(parent) = local_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ExportError::LocalFile {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let mut tracker = ProgressTracker::new(None).with_estimate(estimate);
    let result = {
        let mut on_progress = |bytes: u64| {
            if let Some(snapshot) = tracker.record(bytes) {
                events.progress(request.target, snapshot);
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExportError::Cancelled),
            result = request.shell.download(host_path, local_path, &mut on_progress) => result,
        }
    };
    let bytes = result?;
    events.progress(request.target, tracker.finish());
    Ok(bytes)
}

async fn dump_in_container(
    request: &ExportRequest<'_>,
    terminal: &mut dyn Interactive,
    cancel: &CancellationToken,
    container_path: &str,
) -> Result<(), ExportError> {
    // The container shell may not echo our sentinel until it has started.
    let settle = ExchangeSettings {
        sentinel: false,
        ..request.exchange.clone()
    };
    exchange(terminal, &request.cli.shell_into(request.target), &settle).await?;
    check_cancelled(cancel)?;

    exchange(
        terminal,
        &format!("export MYSQL_PWD={}", quote(&request.credentials.password)),
        &request.exchange,
    )
    .await?;
    check_cancelled(cancel)?;

    let dump = format!(
        "{} -u {} {} > {}",
        request.client,
        quote(&request.credentials.username),
        quote(request.database),
        quote(container_path)
    );
    debug!(target_id = %request.target, database = request.database, "Dumping database");
    let result = exchange(terminal, &dump, &request.exchange).await?;

    let _ = exchange(terminal, "unset MYSQL_PWD; exit", &settle).await;

    if is_access_denied(&result.output) {
        return Err(ExportError::AccessDenied {
            output: result.output,
        });
    }
    match result.exit_code {
        Some(0) => Ok(()),
        Some(exit_code) => Err(ExportError::DumpFailed {
            exit_code,
            output: result.output,
        }),
        None => {
            warn!("Dump status inconclusive; continuing and checking the file size");
            Ok(())
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), ExportError> {
    if cancel.is_cancelled() {
        Err(ExportError::Cancelled)
    } else {
        Ok(())
    }
}
