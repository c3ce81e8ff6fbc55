// ABOUTME: Validated identifiers for targets and deploy environments.
// ABOUTME: Restricts characters so identifiers can be spliced into shell commands safely.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Maximum accepted length; container names are capped at 128 by the runtimes.
const MAX_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("{0} exceeds maximum length of 128 characters")]
    TooLong(&'static str),

    #[error("{0} cannot start with '{1}'")]
    InvalidStart(&'static str, char),

    #[error("invalid character in {0}: '{1}'")]
    InvalidChar(&'static str, char),
}

fn validate(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty(kind));
    }

    if value.len() > MAX_LEN {
        return Err(IdentifierError::TooLong(kind));
    }

    if let Some(first) = value.chars().next()
        && (first == '-' || first == '.')
    {
        return Err(IdentifierError::InvalidStart(kind, first));
    }

    for c in value.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(IdentifierError::InvalidChar(kind, c));
        }
    }

    Ok(())
}

/// Identifier of a remote workload: a container id or container name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(value: &str) -> Result<Self, IdentifierError> {
        validate("target id", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Name of a deploy environment such as `dev` or `prod`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Environment(String);

impl Environment {
    pub fn new(value: &str) -> Result<Self, IdentifierError> {
        validate("environment", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_identifier {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::new(s)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                <$ty>::new(&value).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_identifier!(TargetId);
string_identifier!(Environment);
