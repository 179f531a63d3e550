//! Path utilities.
//!
//! Paths reported by the snapshot daemon are absolute strings rooted at the
//! managed subvolume. These helpers compare and re-root them without touching
//! the filesystem.

use std::path::{Path, PathBuf};

/// Get the snapctl configuration directory.
///
/// This follows XDG conventions:
/// - `$XDG_CONFIG_HOME/snapctl` if set
/// - `~/.config/snapctl` otherwise
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("snapctl"))
}

/// Check whether `path` matches an exclusion entry.
///
/// An entry matches the path itself and, treated as a directory, anything
/// below it. A trailing separator on the entry is ignored, so `/tmp` and
/// `/tmp/` both match `/tmp/x` but neither matches `/tmpfoo`.
pub fn is_excluded_by(path: &str, entry: &str) -> bool {
    let dir = entry.trim_end_matches('/');
    if dir.is_empty() {
        // "/" excludes everything under the root.
        return entry.starts_with('/') && path.starts_with('/');
    }

    path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Re-root an absolute daemon path under a mount point.
///
/// `mounted("/.snapshots/4/snapshot", "/etc/motd")` yields
/// `/.snapshots/4/snapshot/etc/motd`.
pub fn mounted(mount: &Path, path: &str) -> PathBuf {
    mount.join(path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        if let Some(dir) = config_dir() {
            assert!(dir.ends_with("snapctl"));
        }
    }

    #[test]
    fn test_exact_match() {
        assert!(is_excluded_by("/etc/motd", "/etc/motd"));
        assert!(!is_excluded_by("/etc/motd", "/etc/motd.d"));
    }

    #[test]
    fn test_directory_prefix() {
        assert!(is_excluded_by("/tmp/x", "/tmp"));
        assert!(is_excluded_by("/tmp/a/b/c", "/tmp/"));
        assert!(!is_excluded_by("/tmpfoo", "/tmp"));
        assert!(!is_excluded_by("/tmpfoo/x", "/tmp/"));
    }

    #[test]
    fn test_root_entry() {
        assert!(is_excluded_by("/etc/motd", "/"));
        assert!(!is_excluded_by("/etc/motd", ""));
    }

    #[test]
    fn test_mounted() {
        let mount = Path::new("/.snapshots/4/snapshot");
        assert_eq!(
            mounted(mount, "/etc/motd"),
            PathBuf::from("/.snapshots/4/snapshot/etc/motd")
        );
        assert_eq!(mounted(Path::new("/"), "/etc/motd"), PathBuf::from("/etc/motd"));
    }
}
