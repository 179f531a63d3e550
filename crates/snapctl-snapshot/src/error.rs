//! Snapshot error types.

use snapctl_bus::{BusError, RemoteReason};
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A daemon call failed.
    #[error("Error encountered while {context}: {reason}")]
    Remote {
        context: String,
        reason: RemoteReason,
    },

    /// Invalid argument supplied by the caller.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The daemon or a required host tool is missing.
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A wrapped operation failed.
    #[error("Operation '{name}' failed: {message}")]
    Operation { name: String, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SnapshotError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a capability unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::CapabilityUnavailable(message.into())
    }

    /// Create an operation failed error.
    pub fn operation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Map a bus failure into a user-facing error for the given activity.
///
/// ```ignore
/// bus.list_snapshots(config).await.map_err(remote("listing snapshots"))?;
/// ```
pub(crate) fn remote(context: impl Into<String>) -> impl FnOnce(BusError) -> SnapshotError {
    let context = context.into();
    move |err| SnapshotError::Remote {
        context,
        reason: err.reason(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_message() {
        let err = remote("listing snapshots")(BusError::remote("error.unknown_config"));
        assert_eq!(
            err.to_string(),
            "Error encountered while listing snapshots: Unknown configuration"
        );
        assert!(matches!(
            err,
            SnapshotError::Remote {
                reason: RemoteReason::UnknownConfig,
                ..
            }
        ));
    }

    #[test]
    fn test_opaque_reason_passthrough() {
        let err = remote("mounting snapshot 4")(BusError::remote("error.mount_failed"));
        assert_eq!(
            err.to_string(),
            "Error encountered while mounting snapshot 4: error.mount_failed"
        );
    }
}
