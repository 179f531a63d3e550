//! Wire-level records exchanged with the snapshot daemon.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Snapshot number the daemon uses for the live filesystem.
pub const LIVE_STATE: u32 = 0;

/// Timestamp the daemon reports when a snapshot has no creation date.
pub const UNSET_TIMESTAMP: i64 = -1;

/// A snapshot as reported by the daemon, field for field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub number: u32,
    /// 0 = single, 1 = pre, 2 = post.
    pub kind: u16,
    /// Number of the matching pre snapshot, 0 when there is none.
    pub pre_number: u32,
    /// Seconds since the epoch, or [`UNSET_TIMESTAMP`].
    pub date: i64,
    pub uid: u32,
    pub description: String,
    pub cleanup: String,
    pub userdata: HashMap<String, String>,
}

/// A config as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigInfo {
    pub name: String,
    pub subvolume: String,
    pub settings: HashMap<String, String>,
}

/// One entry of a comparison's file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub status: u32,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, status: u32) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// Counts reported by an undo, keyed by action (`create`, `modify`, `delete`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UndoSummary(pub BTreeMap<String, u64>);

impl UndoSummary {
    /// Parse the `create:N modify:N delete:N` line printed by `snapper undochange`.
    pub fn parse(output: &str) -> Option<Self> {
        let mut counts = BTreeMap::new();
        for token in output.split_whitespace() {
            let (key, value) = token.split_once(':')?;
            counts.insert(key.to_string(), value.parse().ok()?);
        }
        Some(Self(counts))
    }

    /// Get the count for an action, 0 if it was not reported.
    pub fn get(&self, action: &str) -> u64 {
        self.0.get(action).copied().unwrap_or(0)
    }
}
