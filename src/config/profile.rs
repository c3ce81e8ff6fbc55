// ABOUTME: Connection profiles: named SSH endpoints kept in the profile store.
// ABOUTME: Parses shorthand like "user@host:port" and builds session configs.

use crate::ssh::{Credentials, SessionConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// Password; key or agent authentication is used when absent.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(default = "default_trust_first_connection")]
    pub trust_first_connection: bool,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .field("last_used", &self.last_used)
            .finish()
    }
}

fn default_port() -> u16 {
    22
}

fn default_trust_first_connection() -> bool {
    true
}

impl ConnectionProfile {
    /// Parse `[user@]host[:port]`. The user defaults to `default_user`.
    pub fn parse(name: &str, s: &str, default_user: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("server address cannot be empty".to_string());
        }

        let (user_part, rest) = match s.split_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port_str))?;
                (host, port)
            }
            None => (rest, 22),
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }
        let username = user_part.unwrap_or(default_user);
        if username.is_empty() {
            return Err("username cannot be empty".to_string());
        }

        Ok(ConnectionProfile {
            name: name.to_string(),
            host: host.to_string(),
            port,
            username: username.to_string(),
            secret: None,
            key_path: None,
            trust_first_connection: true,
            last_used: None,
        })
    }

    /// Identity key: two profiles with the same key reach the same account.
    pub fn identity(&self) -> (&str, u16, &str) {
        (&self.host, self.port, &self.username)
    }

    pub fn address(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    pub fn session_config(&self, command_timeout: Duration) -> SessionConfig {
        let credentials = match (&self.secret, &self.key_path) {
            (Some(secret), _) => Credentials::Password(secret.clone()),
            (None, Some(path)) => Credentials::KeyFile(path.clone()),
            (None, None) => Credentials::Discover,
        };
        SessionConfig::new(&self.host, &self.username)
            .port(self.port)
            .credentials(credentials)
            .trust_first_connection(self.trust_first_connection)
            .command_timeout(command_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_address_forms() {
        let p = ConnectionProfile::parse("prod", "deploy@10.0.0.5:2222", "root").unwrap();
        assert_eq!(p.identity(), ("10.0.0.5", 2222, "deploy"));

        let p = ConnectionProfile::parse("prod", "example.com", "ops").unwrap();
        assert_eq!(p.identity(), ("example.com", 22, "ops"));
        assert_eq!(p.address(), "ops@example.com:22");
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(ConnectionProfile::parse("x", "", "root").is_err());
        assert!(ConnectionProfile::parse("x", "host:port", "root").is_err());
        assert!(ConnectionProfile::parse("x", "user@:22", "root").is_err());
        assert!(ConnectionProfile::parse("x", "host", "").is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let mut p = ConnectionProfile::parse("x", "host", "root").unwrap();
        p.secret = Some("hunter2".to_string());
        let rendered = format!("{p:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn session_config_carries_credentials() {
        let mut p = ConnectionProfile::parse("x", "root@host:2200", "root").unwrap();
        p.secret = Some("pw".to_string());
        let config = p.session_config(Duration::from_secs(5));
        assert_eq!(config.port, 2200);
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert_eq!(config.command_timeout, Duration::from_secs(5));
    }
}
