//! Change classification for comparison results.

use serde::{Deserialize, Serialize};

/// Status flags reported per file, in ascending bit order.
const CHANGE_KINDS: [(u32, &str); 9] = [
    (ChangeStatus::CREATED, "created"),
    (ChangeStatus::DELETED, "deleted"),
    (ChangeStatus::MODIFIED, "modified"),
    (ChangeStatus::TYPE, "type changed"),
    (ChangeStatus::PERMISSIONS, "permission changed"),
    (ChangeStatus::OWNER, "owner changed"),
    (ChangeStatus::GROUP, "group changed"),
    (ChangeStatus::XATTRS, "extended attributes changed"),
    (ChangeStatus::ACL, "ACL info changed"),
];

/// Bitmask describing how a file changed between two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeStatus(pub u32);

impl ChangeStatus {
    pub const CREATED: u32 = 1;
    pub const DELETED: u32 = 2;
    pub const MODIFIED: u32 = 4;
    pub const TYPE: u32 = 8;
    pub const PERMISSIONS: u32 = 16;
    pub const OWNER: u32 = 32;
    pub const GROUP: u32 = 64;
    pub const XATTRS: u32 = 128;
    pub const ACL: u32 = 256;

    /// Labels for every set flag, lowest bit first. Empty for 0.
    pub fn labels(&self) -> Vec<&'static str> {
        CHANGE_KINDS
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, label)| *label)
            .collect()
    }

    /// Rebuild a status from labels. Unknown labels are ignored.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let bits = labels
            .iter()
            .filter_map(|label| {
                CHANGE_KINDS
                    .iter()
                    .find(|(_, known)| *known == label.as_ref())
                    .map(|(bit, _)| *bit)
            })
            .sum();
        Self(bits)
    }

    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    pub fn is_modified(&self) -> bool {
        self.contains(Self::MODIFIED)
    }
}

/// Decode a status bitmask into labels.
pub fn status_to_labels(status: u32) -> Vec<&'static str> {
    ChangeStatus(status).labels()
}
