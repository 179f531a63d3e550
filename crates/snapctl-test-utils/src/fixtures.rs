//! Daemon replies used across tests.

use snapctl_bus::{ChangedFile, ConfigInfo, RawSnapshot};
use std::collections::HashMap;

fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A `pre` snapshot owned by root.
pub fn pre_snapshot() -> RawSnapshot {
    RawSnapshot {
        number: 42,
        kind: 1,
        pre_number: 0,
        date: 1457006571,
        uid: 0,
        description: "Some description".to_string(),
        cleanup: String::new(),
        userdata: map(&[("userdata1", "userval1")]),
    }
}

/// The `post` snapshot matching [`pre_snapshot`].
pub fn post_snapshot() -> RawSnapshot {
    RawSnapshot {
        number: 43,
        kind: 2,
        pre_number: 42,
        date: 1457006572,
        uid: 0,
        description: "Blah Blah".to_string(),
        cleanup: String::new(),
        userdata: map(&[("userdata2", "userval2")]),
    }
}

/// Both snapshots of the pre/post pair.
pub fn snapshots() -> Vec<RawSnapshot> {
    vec![pre_snapshot(), post_snapshot()]
}

/// The `root` config of a default btrfs install.
pub fn root_config() -> ConfigInfo {
    ConfigInfo {
        name: "root".to_string(),
        subvolume: "/".to_string(),
        settings: map(&[
            ("SUBVOLUME", "/"),
            ("FSTYPE", "btrfs"),
            ("QGROUP", "1/0"),
            ("SPACE_LIMIT", "0.5"),
            ("ALLOW_USERS", ""),
            ("ALLOW_GROUPS", ""),
            ("SYNC_ACL", "no"),
            ("BACKGROUND_COMPARISON", "yes"),
            ("NUMBER_CLEANUP", "yes"),
            ("NUMBER_MIN_AGE", "1800"),
            ("NUMBER_LIMIT", "10"),
            ("NUMBER_LIMIT_IMPORTANT", "10"),
            ("TIMELINE_CREATE", "no"),
            ("TIMELINE_CLEANUP", "yes"),
            ("TIMELINE_MIN_AGE", "1800"),
            ("TIMELINE_LIMIT_HOURLY", "4-10"),
            ("TIMELINE_LIMIT_DAILY", "4-10"),
            ("TIMELINE_LIMIT_WEEKLY", "0"),
            ("TIMELINE_LIMIT_MONTHLY", "4-10"),
            ("TIMELINE_LIMIT_YEARLY", "4-10"),
            ("EMPTY_PRE_POST_CLEANUP", "yes"),
            ("EMPTY_PRE_POST_MIN_AGE", "1800"),
        ]),
    }
}

/// A minimal btrfs config managing `subvolume`.
pub fn config(name: &str, subvolume: &str) -> ConfigInfo {
    ConfigInfo {
        name: name.to_string(),
        subvolume: subvolume.to_string(),
        settings: map(&[("SUBVOLUME", subvolume), ("FSTYPE", "btrfs")]),
    }
}

/// A comparison with one modified file and one created file.
///
/// `/etc/motd` is modified with changed permissions (4 | 16), `/tmp/x` is new.
pub fn changed_files() -> Vec<ChangedFile> {
    vec![
        ChangedFile::new("/etc/motd", 20),
        ChangedFile::new("/tmp/x", 1),
    ]
}
