use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// What a failed acquisition was waiting on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockTarget {
    /// A single entity, rendered through its identity's `Debug` form.
    Entity(String),
    /// The engine-wide lock used by wide operations.
    Global,
}

impl LockTarget {
    pub fn entity<I: fmt::Debug + ?Sized>(identity: &I) -> Self {
        Self::Entity(format!("{:?}", identity))
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

impl fmt::Display for LockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(identity) => write!(f, "entity {}", identity),
            Self::Global => write!(f, "global lock"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Can't acquire the {target} within {} milliseconds", .timeout.as_millis())]
    LockTimeout { target: LockTarget, timeout: Duration },

    #[error("Interrupted while waiting for the {target}")]
    Cancelled { target: LockTarget },

    #[error("Lock of {0} is not held by the current thread")]
    NotOwner(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl LockError {
    pub fn timeout(target: LockTarget, timeout: Duration) -> Self {
        Self::LockTimeout { target, timeout }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Lock the failure refers to, if it came from an acquisition.
    pub fn target(&self) -> Option<&LockTarget> {
        match self {
            Self::LockTimeout { target, .. } | Self::Cancelled { target } => Some(target),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LockError>;

impl From<std::io::Error> for LockError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LockError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
