// ABOUTME: Shared setup for commands that talk to a remote host.
// ABOUTME: Loads config and profile, opens the SSH session and wires the engine together.

use chrono::Utc;
use dockside::config::{ConnectionProfile, ConsoleConfig};
use dockside::diagnostics::{Diagnostics, Warning};
use dockside::error::{Error, Result};
use dockside::ops::ConsoleHandler;
use dockside::output::Output;
use dockside::pipeline::PipelineRunner;
use dockside::registry::TargetRegistry;
use dockside::runtime::{ContainerCli, detect_runtime};
use dockside::ssh::{RemoteShell, Session};
use dockside::store::{ConfigStore, JsonStore, default_state_dir};
use std::env;
use std::sync::Arc;
use tracing::debug;

/// Open the profile store in the user's state directory.
pub fn open_store() -> Result<Arc<dyn ConfigStore>> {
    let store = JsonStore::open(default_state_dir()?)?;
    debug!(path = %store.path().display(), "Opened state store");
    Ok(Arc::new(store))
}

/// Everything a command needs to run operations on one host.
pub struct Console {
    pub config: Arc<ConsoleConfig>,
    pub registry: Arc<TargetRegistry>,
    pub handler: Arc<ConsoleHandler>,
    session: Arc<Session>,
}

impl Console {
    /// Connect using `--profile`, falling back to the config file's profile.
    pub async fn open(
        profile_override: Option<&str>,
        output: &Output,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        let cwd = env::current_dir()?;
        let config = Arc::new(ConsoleConfig::discover_or_default(&cwd)?);
        let store = open_store()?;

        let name = profile_override
            .map(str::to_string)
            .or_else(|| config.profile.clone())
            .ok_or_else(|| {
                Error::InvalidConfig(
                    "no connection profile selected; pass --profile or set `profile` in dockside.yml"
                        .to_string(),
                )
            })?;
        let profile: ConnectionProfile = store
            .profile(&name)?
            .ok_or_else(|| Error::UnknownProfile(name.clone()))?;

        output.progress(&format!("  → Connecting to {}...", profile.address()));
        let session = Session::connect(profile.session_config(config.command_timeout)).await?;
        if let Err(e) = store.touch_profile(&profile.name, Utc::now()) {
            diag.warn(Warning::store(format!("failed to record profile use: {e}")));
        }
        let session = Arc::new(session);
        let shell: Arc<dyn RemoteShell> = session.clone();

        let runtime = detect_runtime(shell.as_ref(), config.runtime).await?;
        output.progress(&format!("  → Using {runtime}"));
        let cli = ContainerCli::new(runtime);

        let registry = Arc::new(TargetRegistry::new(Arc::clone(&shell), cli));
        let runner = PipelineRunner::new(
            Arc::clone(&shell),
            cli,
            Arc::clone(&store),
            Arc::clone(&config),
        )
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let handler = Arc::new(ConsoleHandler::new(
            shell,
            cli,
            Arc::new(runner),
            store,
            Arc::clone(&config),
            profile.name,
        ));

        Ok(Self {
            config,
            registry,
            handler,
            session,
        })
    }

    /// Drop the engine and disconnect the session.
    pub async fn close(self, diag: &mut Diagnostics) {
        let Self {
            config: _,
            registry,
            handler,
            session,
        } = self;
        drop(registry);
        drop(handler);

        match Arc::try_unwrap(session) {
            Ok(session) => {
                if let Err(e) = session.disconnect().await {
                    diag.warn(Warning::ssh_disconnect(e.to_string()));
                }
            }
            Err(_) => debug!("Session still shared; leaving it to close on drop"),
        }
    }
}
