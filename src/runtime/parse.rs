// ABOUTME: Parses container runtime CLI output into typed records.
// ABOUTME: Malformed listing entries are skipped and counted rather than failing the batch.

use crate::types::{LifecycleState, PortBinding, Target, TargetId};
use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use tracing::warn;

const LISTING_FIELDS: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {LISTING_FIELDS} tab-separated fields, found {0}")]
    FieldCount(usize),

    #[error("invalid target id: {0}")]
    Identifier(String),

    #[error("unrecognised status: {0}")]
    Status(String),

    #[error("unparseable creation time: {0}")]
    CreatedAt(String),
}

/// Result of parsing one listing.
#[derive(Debug, Default)]
pub struct Listing {
    pub targets: Vec<Target>,
    /// Entries that could not be parsed.
    pub skipped: usize,
}

/// Parse the output of the tab-separated `ps -a` listing.
pub fn parse_listing(stdout: &str) -> Listing {
    let mut listing = Listing::default();
    for line in stdout.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match parse_listing_line(line) {
            Ok(target) => listing.targets.push(target),
            Err(e) => {
                warn!(error = %e, line, "Skipping unparseable listing entry");
                listing.skipped += 1;
            }
        }
    }
    listing
}

pub fn parse_listing_line(line: &str) -> Result<Target, ParseError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < LISTING_FIELDS {
        return Err(ParseError::FieldCount(fields.len()));
    }

    let id = TargetId::new(fields[0].trim())
        .map_err(|_| ParseError::Identifier(fields[0].to_string()))?;
    let status = fields[4].trim();

    Ok(Target {
        id,
        image: fields[1].trim().to_string(),
        command: fields[2].trim().trim_matches('"').to_string(),
        created_at: parse_created_at(fields[3])?,
        status: status.to_string(),
        state: parse_status(status)?,
        ports: parse_ports(fields[5]),
    })
}

/// Classify a human status column such as `Up 3 hours (Paused)`.
pub fn parse_status(status: &str) -> Result<LifecycleState, ParseError> {
    let status = status.trim();
    let lower = status.to_ascii_lowercase();

    if lower.starts_with("up") {
        if lower.contains("(paused)") {
            return Ok(LifecycleState::Paused);
        }
        return Ok(LifecycleState::Running);
    }
    if lower.starts_with("exited") {
        return Ok(LifecycleState::Exited(parenthesised_code(status)));
    }
    if lower.starts_with("restarting") {
        return Ok(LifecycleState::Restarting);
    }
    if lower == "created" {
        return Ok(LifecycleState::Created);
    }
    if lower == "paused" {
        return Ok(LifecycleState::Paused);
    }
    if lower == "dead" {
        return Ok(LifecycleState::Dead);
    }
    if lower.starts_with("removal in progress") {
        return Ok(LifecycleState::Removing);
    }
    Err(ParseError::Status(status.to_string()))
}

fn parenthesised_code(status: &str) -> Option<i32> {
    let open = status.find('(')?;
    let close = status[open..].find(')')? + open;
    status[open + 1..close].trim().parse().ok()
}

/// Parse `2024-01-15 10:30:00 +0000 UTC` (fractional seconds optional).
pub fn parse_created_at(raw: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let parts: Vec<&str> = raw.split_whitespace().take(3).collect();
    if parts.len() < 3 {
        return Err(ParseError::CreatedAt(raw.to_string()));
    }
    DateTime::parse_from_str(&parts.join(" "), "%Y-%m-%d %H:%M:%S%.f %z")
        .map_err(|_| ParseError::CreatedAt(raw.to_string()))
}

/// Parse the ports column. Entries that cannot be read (such as ranges) are dropped.
pub fn parse_ports(raw: &str) -> Vec<PortBinding> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(parse_port)
        .collect()
}

fn parse_port(entry: &str) -> Option<PortBinding> {
    let (host, container) = match entry.split_once("->") {
        Some((host, container)) => (Some(host), container),
        None => (None, entry),
    };
    let (port, protocol) = container.split_once('/').unwrap_or((container, "tcp"));
    let container_port = port.parse().ok()?;

    let (host_ip, host_port) = match host {
        Some(host) => {
            let (ip, port) = host.rsplit_once(':')?;
            (Some(ip.to_string()), Some(port.parse().ok()?))
        }
        None => (None, None),
    };

    Some(PortBinding {
        host_ip,
        host_port,
        container_port,
        protocol: protocol.to_string(),
    })
}

/// Parse a byte count printed by `stat -c %s`.
pub fn parse_size(stdout: &str) -> Option<u64> {
    stdout.trim().lines().last()?.trim().parse().ok()
}

/// Whether client output reports rejected database credentials.
pub fn is_access_denied(output: &str) -> bool {
    output.contains("Access denied")
}
