// ABOUTME: Config scaffolding for new workspaces.
// ABOUTME: Creates a commented dockside.yml template.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, ConsoleConfig};

/// Write a starter config into `dir`; returns the path written.
pub fn init_config(dir: &Path, profile: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = ConsoleConfig::template();
    if let Some(name) = profile {
        if name.trim().is_empty() {
            return Err(Error::InvalidConfig("profile name cannot be empty".to_string()));
        }
        config.profile = Some(name.to_string());
    }

    std::fs::write(&config_path, generate_template_yaml(&config))?;
    Ok(config_path)
}

fn generate_template_yaml(config: &ConsoleConfig) -> String {
    format!(
        r#"# Connection profile from the profile store (see `dockside profiles`)
profile: {}
# runtime: docker

poll_interval: 200ms
refresh_interval: 30s
command_timeout: 5m

interactive:
  term: {}
  settle_delay: 500ms
  # Frame commands with an exit-status marker; disable for shells that mangle it
  sentinel: {}

environments:
  prod:
    build: mvn -q package -DskipTests
    workdir: /app
    local_path: target/dist
    remote_path: /srv/app
    # activate: "mkdir -p {{remote_path}} && tar -xzf {{archive}} -C {{remote_path}} && {{runtime}} restart {{target}}"

activation:
  # Whole-line regexes; any other stderr output fails activation
  benign_stderr:
    - '{}'

logs:
  tail: {}
  batch_window: 10s

export:
  client: {}
  local_dir: {}
"#,
        config.profile.as_deref().unwrap_or("production"),
        config.interactive.term,
        config.interactive.sentinel,
        super::MYSQL_PASSWORD_WARNING,
        config.logs.tail,
        config.export.client,
        config.export.local_dir.display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path(), Some("staging"), false).unwrap();
        let config = ConsoleConfig::load(&path).unwrap();
        assert_eq!(config.profile.as_deref(), Some("staging"));
        assert_eq!(config.environments.len(), 1);
        assert_eq!(config.activation.benign_stderr.len(), 1);
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), None, false).unwrap();
        assert!(matches!(
            init_config(dir.path(), None, false),
            Err(Error::AlreadyExists(_))
        ));
        init_config(dir.path(), None, true).unwrap();
    }
}
