//! Unified diffs between two snapshot trees.

use crate::{SnapshotModule, SnapshotResult};
use similar::TextDiff;
use snapctl_util::path::mounted;
use snapctl_util::TimingGuard;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Lines of context around each hunk.
const CONTEXT_LINES: usize = 3;

impl SnapshotModule {
    /// Produce unified diffs between two snapshots, keyed by path.
    ///
    /// Without `filename` every file in the comparison is considered. Files
    /// that are binary on the post side are skipped. A file whose content did
    /// not change maps to an empty diff.
    ///
    /// An omitted `post` diffs against the live subvolume of `config`.
    pub async fn diff(
        &self,
        config: &str,
        filename: Option<&str>,
        pre: Option<u32>,
        post: Option<u32>,
    ) -> SnapshotResult<BTreeMap<String, String>> {
        let _timing = TimingGuard::snapshot("diff");
        let (pre, post) = self.resolve_interval(config, pre, post).await?;

        let files = match filename {
            Some(filename) => vec![filename.to_string()],
            None => self
                .compare(config, pre, post)
                .await?
                .into_iter()
                .map(|f| f.path)
                .collect(),
        };

        let diffs = self.diff_paths(config, pre, post, &files).await?;
        info!(config, pre, post, files = diffs.len(), "Computed snapshot diff");
        Ok(diffs)
    }

    /// Mount both snapshots, diff `files` and unmount again.
    pub(crate) async fn diff_paths(
        &self,
        config: &str,
        pre: u32,
        post: u32,
        files: &[String],
    ) -> SnapshotResult<BTreeMap<String, String>> {
        let pre_mount = self.mount(config, pre).await?;
        let post_mount = match self.mount(config, post).await {
            Ok(mount) => mount,
            Err(e) => {
                let _ = self.unmount_all(config, &[pre]).await;
                return Err(e);
            }
        };

        let result = self.diff_mounted(&pre_mount, &post_mount, files).await;
        let unmounted = self.unmount_all(config, &[pre, post]).await;

        let diffs = result?;
        unmounted?;
        Ok(diffs)
    }

    async fn diff_mounted(
        &self,
        pre_mount: &Path,
        post_mount: &Path,
        files: &[String],
    ) -> SnapshotResult<BTreeMap<String, String>> {
        let mut diffs = BTreeMap::new();

        for path in files {
            let pre_file = mounted(pre_mount, path);
            let post_file = mounted(post_mount, path);

            let pre_content = read_regular(&pre_file).await?;
            let post_content = read_regular(&post_file).await?;
            if pre_content.is_none() && post_content.is_none() {
                continue;
            }

            let post_content = post_content.unwrap_or_default();
            if !post_content.is_empty() && !self.probe.is_text(&post_file).await? {
                debug!(path = %path, "Skipping binary file");
                continue;
            }

            let diff = generate_diff(
                &String::from_utf8_lossy(&pre_content.unwrap_or_default()),
                &String::from_utf8_lossy(&post_content),
                &pre_file,
                &post_file,
            );
            diffs.insert(path.clone(), diff);
        }

        Ok(diffs)
    }
}

/// Read a file if it is a regular file. Missing paths and non-files read as `None`.
async fn read_regular(path: &Path) -> SnapshotResult<Option<Vec<u8>>> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(tokio::fs::read(path).await?)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Generate a unified diff labeled with the full paths of both sides.
fn generate_diff(old: &str, new: &str, old_path: &Path, new_path: &Path) -> String {
    let diff = TextDiff::from_lines(old, new);
    let old_header = old_path.display().to_string();
    let new_header = new_path.display().to_string();

    diff.unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&old_header, &new_header)
        .to_string()
}
