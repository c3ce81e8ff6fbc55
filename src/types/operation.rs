// ABOUTME: The fixed catalogue of operations that can be run against a target.
// ABOUTME: Includes eligibility rules derived from the target's lifecycle state.

use super::{Environment, LifecycleState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Container lifecycle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl LifecycleAction {
    /// Runtime subcommand for this action.
    pub fn verb(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Stop => "stop",
            LifecycleAction::Restart => "restart",
        }
    }
}

/// What to do to a target. Describes the request, never how it is carried out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operation {
    Lifecycle(LifecycleAction),
    Inspect,
    LogFollow,
    Build(Environment),
    Deploy(Environment),
    BuildAndDeploy(Environment),
    DataExport(String),
}

impl Operation {
    /// Environment for pipeline operations.
    pub fn environment(&self) -> Option<&Environment> {
        match self {
            Operation::Build(env) | Operation::Deploy(env) | Operation::BuildAndDeploy(env) => {
                Some(env)
            }
            _ => None,
        }
    }

    /// Whether this operation goes through the pipeline runner.
    pub fn is_pipeline(&self) -> bool {
        self.environment().is_some()
    }

    /// Whether the pipeline for this operation runs the remote build step.
    pub fn includes_build(&self) -> bool {
        matches!(self, Operation::Build(_) | Operation::BuildAndDeploy(_))
    }

    /// Whether the pipeline for this operation ships an artifact.
    pub fn includes_deploy(&self) -> bool {
        matches!(self, Operation::Deploy(_) | Operation::BuildAndDeploy(_))
    }

    /// Whether the operation may be dispatched to a target in `state`.
    pub fn is_enabled_for(&self, state: &LifecycleState) -> bool {
        match self {
            Operation::Lifecycle(LifecycleAction::Start) => state.is_stopped(),
            Operation::Lifecycle(LifecycleAction::Stop | LifecycleAction::Restart) => {
                state.is_running()
            }
            Operation::Inspect | Operation::LogFollow => true,
            Operation::Build(_) | Operation::BuildAndDeploy(_) | Operation::DataExport(_) => {
                state.is_running()
            }
            Operation::Deploy(_) => {
                matches!(state, LifecycleState::Running | LifecycleState::Exited(_))
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Lifecycle(action) => write!(f, "{}", action.verb()),
            Operation::Inspect => write!(f, "inspect"),
            Operation::LogFollow => write!(f, "logs"),
            Operation::Build(env) => write!(f, "build:{env}"),
            Operation::Deploy(env) => write!(f, "deploy:{env}"),
            Operation::BuildAndDeploy(env) => write!(f, "build-and-deploy:{env}"),
            Operation::DataExport(db) => write!(f, "export:{db}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationParseError {
    #[error("unknown operation: {0}")]
    Unknown(String),

    #[error("operation '{0}' requires an argument (e.g. '{0}:dev')")]
    MissingArgument(String),

    #[error("operation '{0}' does not take an argument")]
    UnexpectedArgument(String),

    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("invalid database name: {0}")]
    InvalidDatabase(String),
}

/// Parses the `kind[:argument]` form used on the command line.
impl FromStr for Operation {
    type Err = OperationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };

        let environment = |arg: Option<&str>| -> Result<Environment, OperationParseError> {
            let arg = arg.ok_or_else(|| OperationParseError::MissingArgument(kind.to_string()))?;
            Environment::new(arg)
                .map_err(|e| OperationParseError::InvalidEnvironment(e.to_string()))
        };

        let bare = |op: Operation| -> Result<Operation, OperationParseError> {
            match arg {
                Some(_) => Err(OperationParseError::UnexpectedArgument(kind.to_string())),
                None => Ok(op),
            }
        };

        match kind {
            "start" => bare(Operation::Lifecycle(LifecycleAction::Start)),
            "stop" => bare(Operation::Lifecycle(LifecycleAction::Stop)),
            "restart" => bare(Operation::Lifecycle(LifecycleAction::Restart)),
            "inspect" => bare(Operation::Inspect),
            "logs" => bare(Operation::LogFollow),
            "build" => Ok(Operation::Build(environment(arg)?)),
            "deploy" => Ok(Operation::Deploy(environment(arg)?)),
            "build-and-deploy" => Ok(Operation::BuildAndDeploy(environment(arg)?)),
            "export" => {
                let db = arg.ok_or_else(|| OperationParseError::MissingArgument(kind.to_string()))?;
                validate_database(db)?;
                Ok(Operation::DataExport(db.to_string()))
            }
            other => Err(OperationParseError::Unknown(other.to_string())),
        }
    }
}

fn validate_database(name: &str) -> Result<(), OperationParseError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '$');
    if valid {
        Ok(())
    } else {
        Err(OperationParseError::InvalidDatabase(name.to_string()))
    }
}

impl TryFrom<String> for Operation {
    type Error = OperationParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        op.to_string()
    }
}
