//! Bus error types.

use thiserror::Error;

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Error name snapperd replies with for a config it does not manage.
pub const UNKNOWN_CONFIG: &str = "error.unknown_config";

/// Error name snapperd replies with for a snapshot number it does not know.
pub const ILLEGAL_SNAPSHOT: &str = "error.illegal_snapshot";

/// Machine-readable reason attached to a failed remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteReason {
    UnknownConfig,
    IllegalSnapshot,
    /// Any other daemon error name, passed through as-is.
    Other(String),
}

impl RemoteReason {
    /// Decode a daemon error name.
    pub fn from_error_name(name: &str) -> Self {
        match name {
            UNKNOWN_CONFIG => Self::UnknownConfig,
            ILLEGAL_SNAPSHOT => Self::IllegalSnapshot,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for RemoteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownConfig => write!(f, "Unknown configuration"),
            Self::IllegalSnapshot => write!(f, "Invalid snapshot"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Errors that can occur while talking to the snapshot daemon.
#[derive(Debug, Error)]
pub enum BusError {
    /// The daemon rejected the call.
    #[error("{0}")]
    Remote(RemoteReason),

    /// The bus itself could not be reached.
    #[error("bus connection failed: {0}")]
    Connection(String),

    /// The reply could not be interpreted.
    #[error("unexpected reply: {0}")]
    Protocol(String),

    /// The undo helper command failed.
    #[error("undo command failed: {0}")]
    Command(String),
}

impl BusError {
    /// Create a remote error from a daemon error name.
    pub fn remote(name: impl AsRef<str>) -> Self {
        Self::Remote(RemoteReason::from_error_name(name.as_ref()))
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a command error.
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }

    /// Get the decoded reason for this failure.
    ///
    /// Non-remote failures are reported through their message so callers can
    /// always produce a single user-facing line.
    pub fn reason(&self) -> RemoteReason {
        match self {
            Self::Remote(reason) => reason.clone(),
            other => RemoteReason::Other(other.to_string()),
        }
    }
}

impl From<zbus::Error> for BusError {
    fn from(err: zbus::Error) -> Self {
        match err {
            zbus::Error::MethodError(name, _, _) => Self::remote(name.as_str()),
            zbus::Error::FDO(e) => Self::Remote(RemoteReason::Other(e.to_string())),
            other => Self::Connection(other.to_string()),
        }
    }
}

impl From<zbus::fdo::Error> for BusError {
    fn from(err: zbus::fdo::Error) -> Self {
        Self::from(zbus::Error::from(err))
    }
}
