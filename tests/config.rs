// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, file discovery, environment lookup and derived session settings.

use dockside::config::*;
use dockside::error::Error;
use dockside::runtime::RuntimeType;
use dockside::ssh::Credentials;
use dockside::types::Environment;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config = ConsoleConfig::from_yaml("{}").unwrap();
        assert!(config.profile.is_none());
        assert!(config.runtime.is_none());
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.logs.batch_window, Duration::from_secs(10));
        assert_eq!(config.export.client, "mysqldump");
        assert!(config.interactive.sentinel);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
profile: shop-prod
runtime: podman
poll_interval: 250ms
refresh_interval: 1m
command_timeout: 10m

interactive:
  term: vt100
  cols: 120
  rows: 40
  settle_delay: 1s
  sentinel: false

environments:
  prod:
    build: npm run build
    workdir: /srv/web
    local_path: web/dist
    remote_path: /var/www/shop
    activate: "tar -xzf {archive} -C {remote_path}"
  dev:
    build: npm run build:dev

activation:
  benign_stderr:
    - "npm WARN .*"

logs:
  tail: 50
  batch_window: 3s

export:
  client: mariadb-dump
  local_dir: dumps
"#;
        let config = ConsoleConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.profile.as_deref(), Some("shop-prod"));
        assert_eq!(config.runtime, Some(RuntimeType::Podman));
        assert_eq!(config.command_timeout, Duration::from_secs(600));
        assert_eq!(config.interactive.settle_delay, Duration::from_secs(1));
        assert_eq!(config.environments.len(), 2);
        assert_eq!(config.logs.tail, 50);
        assert_eq!(config.export.local_dir, PathBuf::from("dumps"));

        let prod = config.environment(&Environment::new("prod").unwrap());
        assert_eq!(prod.workdir.as_deref(), Some("/srv/web"));
        assert_eq!(prod.activate_template(), "tar -xzf {archive} -C {remote_path}");

        let dev = config.environment(&Environment::new("dev").unwrap());
        assert!(dev.remote_path.is_none());
        assert!(dev.activate_template().contains("restart"));
    }

    #[test]
    fn unknown_environment_gets_empty_settings() {
        let config = ConsoleConfig::from_yaml("{}").unwrap();
        let staging = config.environment(&Environment::new("staging").unwrap());
        assert!(staging.build.is_none());
        assert!(staging.local_path.is_none());
    }

    #[test]
    fn invalid_duration_is_a_parse_error() {
        let result = ConsoleConfig::from_yaml("poll_interval: soon");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn zero_refresh_interval_is_rejected() {
        let result = ConsoleConfig::from_yaml("refresh_interval: 0s");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn unbalanced_allow_list_pattern_is_rejected() {
        let yaml = "activation:\n  benign_stderr:\n    - \"(unclosed\"\n";
        let err = ConsoleConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("benign_stderr"));
    }
}

mod derived_settings {
    use super::*;

    #[test]
    fn interactive_section_drives_pty_and_exchange() {
        let yaml = r#"
poll_interval: 50ms
command_timeout: 30s
interactive:
  term: vt100
  cols: 100
  rows: 30
  settle_delay: 2s
  sentinel: false
"#;
        let config = ConsoleConfig::from_yaml(yaml).unwrap();

        let pty = config.pty_request();
        assert_eq!((pty.term.as_str(), pty.cols, pty.rows), ("vt100", 100, 30));

        let exchange = config.exchange_settings();
        assert_eq!(exchange.settle_delay, Duration::from_secs(2));
        assert_eq!(exchange.poll_interval, Duration::from_millis(50));
        assert_eq!(exchange.timeout, Duration::from_secs(30));
        assert!(!exchange.sentinel);
    }

    #[test]
    fn default_allow_list_compiles() {
        let patterns = ActivationConfig::default().compile().unwrap();
        assert_eq!(patterns.len(), 1);
    }
}

mod discovery {
    use super::*;

    #[test]
    fn finds_primary_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dockside.yml"), "profile: a").unwrap();
        let config = ConsoleConfig::discover(dir.path()).unwrap();
        assert_eq!(config.profile.as_deref(), Some("a"));
    }

    #[test]
    fn finds_config_in_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".dockside")).unwrap();
        fs::write(dir.path().join(".dockside/config.yml"), "profile: b").unwrap();
        let config = ConsoleConfig::discover(dir.path()).unwrap();
        assert_eq!(config.profile.as_deref(), Some("b"));
    }

    #[test]
    fn missing_file_is_an_error_for_discover_only() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ConsoleConfig::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
        let config = ConsoleConfig::discover_or_default(dir.path()).unwrap();
        assert!(config.environments.is_empty());
    }

    #[test]
    fn broken_file_is_not_replaced_by_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dockside.yml"), "poll_interval: [").unwrap();
        assert!(ConsoleConfig::discover_or_default(dir.path()).is_err());
    }

    #[test]
    fn init_writes_a_loadable_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path(), None, false).unwrap();
        let config = ConsoleConfig::discover(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "dockside.yml");
        assert_eq!(config.profile.as_deref(), Some("production"));
        assert!(
            config
                .environment(&Environment::new("prod").unwrap())
                .build
                .is_some()
        );
    }
}

mod profiles {
    use super::*;

    #[test]
    fn session_config_carries_profile_credentials() {
        let mut profile = ConnectionProfile::parse("shop", "deploy@web1:2222", "root").unwrap();
        profile.secret = Some("hunter2".to_string());
        profile.trust_first_connection = false;

        let session = profile.session_config(Duration::from_secs(60));
        assert_eq!(session.host, "web1");
        assert_eq!(session.port, 2222);
        assert_eq!(session.user, "deploy");
        assert!(matches!(&session.credentials, Credentials::Password(p) if p == "hunter2"));
        assert!(!session.host_keys.trust_first_connection);
        assert_eq!(session.command_timeout, Duration::from_secs(60));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let mut profile = ConnectionProfile::parse("shop", "web1", "root").unwrap();
        profile.secret = Some("hunter2".to_string());
        assert!(!format!("{profile:?}").contains("hunter2"));
    }

    #[test]
    fn rejects_bad_port() {
        assert!(ConnectionProfile::parse("shop", "web1:http", "root").is_err());
    }
}
