// ABOUTME: Console output for the dockside binary.
// ABOUTME: Renders console events, target tables and batch reports in normal, quiet or JSON mode.

use crate::batch::{BatchReport, OperationRecord, Outcome};
use crate::config::ConnectionProfile;
use crate::events::{ConsoleEvent, LogKind};
use crate::progress::{format_bytes, format_duration};
use crate::registry::Snapshot;
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    #[default]
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration_secs(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => print_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration_secs(),
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration_secs(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => print_json(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print a console event emitted by a running operation.
    pub fn event(&self, event: &ConsoleEvent) {
        match self.mode {
            OutputMode::Normal => {
                if let Some(line) = render_event(event) {
                    match event {
                        ConsoleEvent::Log {
                            kind: LogKind::Error,
                            ..
                        } => eprintln!("{line}"),
                        _ => println!("{line}"),
                    }
                }
            }
            OutputMode::Quiet => {}
            OutputMode::Json => print_json(event),
        }
    }

    /// Print the targets of a registry snapshot.
    pub fn targets(&self, snapshot: &Snapshot) {
        match self.mode {
            OutputMode::Json => {
                for target in snapshot.targets() {
                    print_json(target);
                }
            }
            OutputMode::Normal | OutputMode::Quiet => print!("{}", render_targets(snapshot)),
        }
    }

    /// Print saved profiles without their secrets.
    pub fn profiles(&self, profiles: &[ConnectionProfile]) {
        for profile in profiles {
            let last_used = profile
                .last_used
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string());
            match self.mode {
                OutputMode::Json => print_json(&JsonProfile {
                    name: &profile.name,
                    address: profile.address(),
                    last_used: last_used.as_deref(),
                }),
                OutputMode::Normal | OutputMode::Quiet => println!(
                    "{:<16} {:<32} {}",
                    profile.name,
                    profile.address(),
                    last_used.as_deref().unwrap_or("never")
                ),
            }
        }
    }

    /// Print the outcome of every operation in a batch.
    pub fn batch_report(&self, report: &BatchReport) {
        match self.mode {
            OutputMode::Json => {
                for record in &report.records {
                    print_json(record);
                }
            }
            OutputMode::Normal => {
                for record in &report.records {
                    println!("{}", render_record(record));
                }
                println!(
                    "{} succeeded, {} failed, {} skipped",
                    report.succeeded(),
                    report.failed(),
                    report.skipped()
                );
            }
            OutputMode::Quiet => {
                for record in report.records.iter().filter(|r| r.is_failure()) {
                    println!("{}", render_record(record));
                }
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

/// Human-readable line for an event; `None` when the event has nothing to show.
pub fn render_event(event: &ConsoleEvent) -> Option<String> {
    match event {
        ConsoleEvent::Log { target, line, .. } => Some(format!("[{target}] {line}")),
        ConsoleEvent::Stage {
            target,
            environment,
            stage,
        } => Some(format!("  → {target} ({environment}): {stage}")),
        ConsoleEvent::Progress { target, snapshot } => Some(format!("  → {target}: {snapshot}")),
        ConsoleEvent::OperationStarted { target, operation } => {
            Some(format!("{operation} on {target}"))
        }
        ConsoleEvent::OperationFinished { .. } => None,
    }
}

/// Fixed-width table of targets, one per line, headed by column names.
pub fn render_targets(snapshot: &Snapshot) -> String {
    let mut out = format!(
        "{:<14} {:<14} {:<32} {}\n",
        "ID", "STATE", "IMAGE", "PORTS"
    );
    for target in snapshot.targets() {
        let ports = target
            .ports
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "{:<14} {:<14} {:<32} {}\n",
            target.id.as_str(),
            target.state.to_string(),
            target.image,
            ports
        ));
    }
    out
}

pub fn render_record(record: &OperationRecord) -> String {
    let head = format!("{} {}", record.target, record.operation);
    match &record.outcome {
        Outcome::Succeeded {
            duration,
            bytes_transferred,
            ..
        } => match bytes_transferred {
            Some(bytes) => format!(
                "  ✓ {head} ({}, {})",
                format_duration(*duration),
                format_bytes(*bytes)
            ),
            None => format!("  ✓ {head} ({})", format_duration(*duration)),
        },
        Outcome::Failed { message, .. } => format!("  ✗ {head}: {message}"),
        Outcome::Skipped { reason } => format!("  - {head}: skipped ({reason})"),
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct JsonProfile<'a> {
    name: &'a str,
    address: String,
    last_used: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::PipelineStage;
    use crate::types::{Environment, Operation, TargetId};
    use std::time::Duration;

    fn id(s: &str) -> TargetId {
        TargetId::new(s).unwrap()
    }

    #[test]
    fn log_lines_are_prefixed_with_target() {
        let event = ConsoleEvent::Log {
            target: id("abc123"),
            kind: LogKind::Normal,
            line: "compiling".to_string(),
        };
        assert_eq!(render_event(&event).unwrap(), "[abc123] compiling");
    }

    #[test]
    fn stage_lines_name_environment() {
        let event = ConsoleEvent::Stage {
            target: id("abc123"),
            environment: Environment::new("prod").unwrap(),
            stage: PipelineStage::Transferring,
        };
        let line = render_event(&event).unwrap();
        assert!(line.contains("abc123 (prod)"));
    }

    #[test]
    fn finished_events_render_nothing() {
        let event = ConsoleEvent::OperationFinished {
            target: id("abc123"),
            operation: "start".to_string(),
            success: true,
        };
        assert!(render_event(&event).is_none());
    }

    #[test]
    fn records_render_outcome_markers() {
        let ok = OperationRecord {
            target: id("abc123"),
            operation: Operation::Inspect,
            outcome: Outcome::Succeeded {
                duration: Duration::from_secs(65),
                bytes_transferred: None,
                local_path: None,
                warnings: Vec::new(),
            },
        };
        assert_eq!(render_record(&ok), "  ✓ abc123 inspect (1m 05s)");

        let failed = OperationRecord {
            target: id("abc123"),
            operation: Operation::Inspect,
            outcome: Outcome::Failed {
                kind: ErrorKind::Remote,
                message: "exit 1".to_string(),
                stderr: None,
            },
        };
        assert_eq!(render_record(&failed), "  ✗ abc123 inspect: exit 1");
    }

    #[test]
    fn empty_snapshot_renders_header_only() {
        let table = render_targets(&Snapshot::empty());
        assert_eq!(table.lines().count(), 1);
        assert!(table.starts_with("ID"));
    }
}
