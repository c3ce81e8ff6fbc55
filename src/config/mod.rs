// ABOUTME: Configuration types and parsing for dockside.yml.
// ABOUTME: Handles discovery, defaults, and per-environment pipeline settings.

mod init;
mod profile;

pub use init::init_config;
pub use profile::ConnectionProfile;

use crate::error::{Error, Result};
use crate::runtime::RuntimeType;
use crate::ssh::{ExchangeSettings, PtyRequest};
use crate::types::Environment;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "dockside.yml";
pub const CONFIG_FILENAME_ALT: &str = "dockside.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".dockside/config.yml";

/// Placeholders: `{archive}`, `{remote_path}`, `{target}`, `{runtime}`.
pub const DEFAULT_ACTIVATE: &str =
    "mkdir -p {remote_path} && tar -xzf {archive} -C {remote_path} && {runtime} restart {target}";

/// The client prints this whenever a password is passed on the command line.
pub const MYSQL_PASSWORD_WARNING: &str =
    r"(mysql|mysqldump): \[Warning\] Using a password on the command line interface can be insecure\.";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsoleConfig {
    /// Connection profile used when `--profile` is not given.
    #[serde(default)]
    pub profile: Option<String>,

    /// Container runtime on the remote host; detected when absent.
    #[serde(default)]
    pub runtime: Option<RuntimeType>,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    pub refresh_interval: Duration,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    #[serde(default)]
    pub interactive: InteractiveConfig,

    #[serde(default)]
    pub environments: HashMap<Environment, EnvironmentConfig>,

    #[serde(default)]
    pub activation: ActivationConfig,

    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InteractiveConfig {
    #[serde(default = "default_term")]
    pub term: String,
    #[serde(default = "default_cols")]
    pub cols: u32,
    #[serde(default = "default_rows")]
    pub rows: u32,
    /// Wait after each write before reading output.
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,
    /// Frame each command with an exit-status sentinel.
    #[serde(default = "default_true")]
    pub sentinel: bool,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            term: default_term(),
            cols: default_cols(),
            rows: default_rows(),
            settle_delay: default_settle_delay(),
            sentinel: true,
        }
    }
}

/// How one environment is built and activated.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnvironmentConfig {
    /// Build command run inside the target.
    #[serde(default)]
    pub build: Option<String>,

    /// Working directory for the build inside the target.
    #[serde(default)]
    pub workdir: Option<String>,

    /// Local directory packaged and shipped on deploy.
    #[serde(default)]
    pub local_path: Option<PathBuf>,

    /// Host directory the package is unpacked into.
    #[serde(default)]
    pub remote_path: Option<String>,

    /// Activation command template.
    #[serde(default)]
    pub activate: Option<String>,
}

impl EnvironmentConfig {
    pub fn activate_template(&self) -> &str {
        self.activate.as_deref().unwrap_or(DEFAULT_ACTIVATE)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActivationConfig {
    /// Stderr lines matching one of these (whole line) do not fail activation.
    #[serde(default = "default_benign_stderr")]
    pub benign_stderr: Vec<String>,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            benign_stderr: default_benign_stderr(),
        }
    }
}

impl ActivationConfig {
    /// Compile the allow-list, anchoring every pattern to the full line.
    pub fn compile(&self) -> Result<Vec<Regex>> {
        self.benign_stderr
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$"))
                    .map_err(|e| Error::InvalidConfig(format!("activation.benign_stderr: {e}")))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogsConfig {
    #[serde(default = "default_tail")]
    pub tail: u32,
    /// How long a log follow runs inside a batch before it is stopped.
    #[serde(default = "default_batch_window", with = "humantime_serde")]
    pub batch_window: Duration,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            tail: default_tail(),
            batch_window: default_batch_window(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Dump client run inside the target.
    #[serde(default = "default_export_client")]
    pub client: String,
    /// Where pulled dumps are written.
    #[serde(default = "default_export_dir")]
    pub local_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            client: default_export_client(),
            local_dir: default_export_dir(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_term() -> String {
    "xterm".to_string()
}

fn default_cols() -> u32 {
    200
}

fn default_rows() -> u32 {
    50
}

fn default_settle_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_true() -> bool {
    true
}

fn default_benign_stderr() -> Vec<String> {
    vec![MYSQL_PASSWORD_WARNING.to_string()]
}

fn default_tail() -> u32 {
    200
}

fn default_batch_window() -> Duration {
    Duration::from_secs(10)
}

fn default_export_client() -> String {
    "mysqldump".to_string()
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            profile: None,
            runtime: None,
            poll_interval: default_poll_interval(),
            refresh_interval: default_refresh_interval(),
            command_timeout: default_command_timeout(),
            interactive: InteractiveConfig::default(),
            environments: HashMap::new(),
            activation: ActivationConfig::default(),
            logs: LogsConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl ConsoleConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like `discover`, falling back to defaults when no file exists.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.refresh_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "refresh_interval must be greater than zero".to_string(),
            ));
        }
        self.activation.compile()?;
        Ok(())
    }

    /// Settings for `environment`, or defaults when it is not configured.
    pub fn environment(&self, environment: &Environment) -> EnvironmentConfig {
        self.environments
            .get(environment)
            .cloned()
            .unwrap_or_default()
    }

    pub fn pty_request(&self) -> PtyRequest {
        PtyRequest {
            term: self.interactive.term.clone(),
            cols: self.interactive.cols,
            rows: self.interactive.rows,
        }
    }

    pub fn exchange_settings(&self) -> ExchangeSettings {
        ExchangeSettings {
            settle_delay: self.interactive.settle_delay,
            poll_interval: self.poll_interval,
            timeout: self.command_timeout,
            sentinel: self.interactive.sentinel,
        }
    }

    pub fn template() -> Self {
        let mut environments = HashMap::new();
        if let Ok(env) = Environment::new("prod") {
            environments.insert(
                env,
                EnvironmentConfig {
                    build: Some("mvn -q package -DskipTests".to_string()),
                    workdir: Some("/app".to_string()),
                    local_path: Some(PathBuf::from("target/dist")),
                    remote_path: Some("/srv/app".to_string()),
                    activate: None,
                },
            );
        }
        Self {
            profile: Some("production".to_string()),
            environments,
            ..Self::default()
        }
    }
}
