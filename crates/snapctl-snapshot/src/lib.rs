//! Filesystem snapshot module for snapctl.
//!
//! This crate drives the snapper daemon to:
//! - List, create and delete snapshots and edit configs
//! - Wrap an operation in a pre/post snapshot pair tagged with a job id
//! - Classify and diff the files changed between two snapshots
//! - Undo a chosen subset of those changes
//!
//! # Example
//!
//! ```no_run
//! use snapctl_snapshot::{exclude_paths, RunRequest, SnapshotModule};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let module = SnapshotModule::load().await?;
//!
//! // Run a command between two snapshots
//! let request = RunRequest::new("cmd.run").with_args(json!("zypper -n up"));
//! module.run(&request).await?;
//!
//! // Revert everything since the latest snapshot except /var/log
//! let changed = module.changed_files("root", None, None).await?;
//! let files = exclude_paths(&changed, &["/var/log".to_string()]);
//! module.undo("root", None, None, Some(files.as_slice())).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod diff;
mod error;
mod module;
mod operation;
mod probe;
mod run;
mod snapshot;
mod status;
mod undo;

pub use config::{ConfigUpdate, ConfigValue, SnapperConfig, SnapperSettings};
pub use error::{SnapshotError, SnapshotResult};
pub use module::SnapshotModule;
pub use operation::{BoxedOperation, CommandOperation, Operation, OperationRegistry, PingOperation};
pub use probe::{ContentProbe, FileCommandProbe, SniffProbe};
pub use run::{RunRequest, DEFAULT_CONFIG};
pub use snapshot::{
    lookup_user, SnapshotKind, SnapshotRecord, SnapshotRequest, BASELINE_TAG_KEY, DEFAULT_CLEANUP,
    JOB_ID_KEY,
};
pub use status::{status_to_labels, ChangeStatus};
pub use undo::{exclude_paths, FileChange};

pub use snapctl_bus::{UndoSummary, LIVE_STATE};
