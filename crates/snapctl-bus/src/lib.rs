//! Typed client for the snapper D-Bus service.
//!
//! The daemon owns snapshot storage; this crate only exposes its remote
//! procedures as async methods on the [`SnapperBus`] trait. Calls are never
//! retried: snapshot creation and deletion are not idempotent on the daemon
//! side, so a failed call fails the caller.
//!
//! # Example
//!
//! ```no_run
//! use snapctl_bus::{DbusSnapper, SnapperBus};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = DbusSnapper::connect().await?;
//! for snapshot in bus.list_snapshots("root").await? {
//!     println!("{} {}", snapshot.number, snapshot.description);
//! }
//! # Ok(())
//! # }
//! ```

mod dbus;
mod error;
mod types;

pub use dbus::{DbusSnapper, SNAPPER_COMMAND, SNAPPER_SERVICE};
pub use error::{BusError, BusResult, RemoteReason, ILLEGAL_SNAPSHOT, UNKNOWN_CONFIG};
pub use types::{ChangedFile, ConfigInfo, RawSnapshot, UndoSummary, LIVE_STATE, UNSET_TIMESTAMP};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Remote procedures offered by the snapshot daemon.
#[async_trait]
pub trait SnapperBus: Send + Sync {
    /// List every snapshot of a config.
    async fn list_snapshots(&self, config: &str) -> BusResult<Vec<RawSnapshot>>;

    /// Get one snapshot by number.
    async fn get_snapshot(&self, config: &str, number: u32) -> BusResult<RawSnapshot>;

    /// List every config the daemon manages.
    async fn list_configs(&self) -> BusResult<Vec<ConfigInfo>>;

    /// Get one config by name.
    async fn get_config(&self, name: &str) -> BusResult<ConfigInfo>;

    /// Write settings. Keys and values must already be in daemon form.
    async fn set_config(&self, name: &str, settings: &HashMap<String, String>) -> BusResult<()>;

    /// Create a standalone snapshot and return its number.
    async fn create_single_snapshot(
        &self,
        config: &str,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> BusResult<u32>;

    /// Create a pre snapshot and return its number.
    async fn create_pre_snapshot(
        &self,
        config: &str,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> BusResult<u32>;

    /// Create the post snapshot matching `pre_number` and return its number.
    async fn create_post_snapshot(
        &self,
        config: &str,
        pre_number: u32,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> BusResult<u32>;

    /// Delete snapshots by number.
    async fn delete_snapshots(&self, config: &str, numbers: &[u32]) -> BusResult<()>;

    /// Ask the daemon to compute the changes between two snapshots.
    ///
    /// Must be called before [`SnapperBus::get_files`] for the same pair.
    async fn create_comparison(&self, config: &str, pre: u32, post: u32) -> BusResult<()>;

    /// List the files of a comparison with their status bitmasks.
    async fn get_files(&self, config: &str, pre: u32, post: u32) -> BusResult<Vec<ChangedFile>>;

    /// Mount a snapshot and return the mount point.
    ///
    /// Every successful mount must be paired with [`SnapperBus::umount_snapshot`].
    async fn mount_snapshot(&self, config: &str, number: u32, user_request: bool)
        -> BusResult<String>;

    /// Release a mount obtained with [`SnapperBus::mount_snapshot`].
    async fn umount_snapshot(&self, config: &str, number: u32, user_request: bool)
        -> BusResult<()>;

    /// Revert `files` to their state in `pre`, as seen from `post`.
    async fn undo(
        &self,
        config: &str,
        pre: u32,
        post: u32,
        files: &[String],
    ) -> BusResult<UndoSummary>;
}

/// A shared bus handle.
pub type SharedBus = Arc<dyn SnapperBus>;
