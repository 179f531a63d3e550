//! Change status and selective undo.

use crate::error::remote;
use crate::status::ChangeStatus;
use crate::{SnapshotError, SnapshotModule, SnapshotResult};
use serde::{Deserialize, Serialize};
use snapctl_bus::UndoSummary;
use snapctl_util::path::is_excluded_by;
use snapctl_util::TimingGuard;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// How one file changed between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Change labels, lowest bit first.
    pub status: Vec<String>,

    /// Unified diff, only for modified text files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl FileChange {
    /// Whether the file content changed.
    pub fn is_modified(&self) -> bool {
        ChangeStatus::from_labels(&self.status).is_modified()
    }
}

impl SnapshotModule {
    /// Report every changed file with its labels and, for modified files, a diff.
    pub async fn status(
        &self,
        config: &str,
        pre: Option<u32>,
        post: Option<u32>,
    ) -> SnapshotResult<BTreeMap<String, FileChange>> {
        self.status_with_diff(config, pre, post, true).await
    }

    /// Like [`SnapshotModule::status`], with diffs only when `include_diff` is set.
    pub async fn status_with_diff(
        &self,
        config: &str,
        pre: Option<u32>,
        post: Option<u32>,
        include_diff: bool,
    ) -> SnapshotResult<BTreeMap<String, FileChange>> {
        let _timing = TimingGuard::snapshot("status");
        let (pre, post) = self.resolve_interval(config, pre, post).await?;

        let mut changes: BTreeMap<String, FileChange> = self
            .compare(config, pre, post)
            .await?
            .into_iter()
            .map(|file| {
                let status = ChangeStatus(file.status)
                    .labels()
                    .into_iter()
                    .map(String::from)
                    .collect();
                (file.path, FileChange { status, diff: None })
            })
            .collect();

        if include_diff {
            let modified: Vec<String> = changes
                .iter()
                .filter(|(_, change)| change.is_modified())
                .map(|(path, _)| path.clone())
                .collect();

            if !modified.is_empty() {
                for (path, diff) in self.diff_paths(config, pre, post, &modified).await? {
                    if let Some(change) = changes.get_mut(&path) {
                        change.diff = Some(diff);
                    }
                }
            }
        }

        Ok(changes)
    }

    /// Revert changed files to their state in `pre`.
    ///
    /// `files` must be a subset of the changed set; without it every changed
    /// file is reverted. The daemon's summary is returned unmodified.
    pub async fn undo(
        &self,
        config: &str,
        pre: Option<u32>,
        post: Option<u32>,
        files: Option<&[String]>,
    ) -> SnapshotResult<UndoSummary> {
        let _timing = TimingGuard::snapshot("undo");
        let (pre, post) = self.resolve_interval(config, pre, post).await?;
        let changed: Vec<String> = self
            .compare(config, pre, post)
            .await?
            .into_iter()
            .map(|f| f.path)
            .collect();

        let files = match files {
            Some(requested) => {
                let known: BTreeSet<&str> = changed.iter().map(String::as_str).collect();
                let outside: Vec<&str> = requested
                    .iter()
                    .map(String::as_str)
                    .filter(|f| !known.contains(f))
                    .collect();
                if !outside.is_empty() {
                    return Err(SnapshotError::invalid_argument(format!(
                        "given file list contains files that are not present in the \
                         changed filelist: {}",
                        outside.join(", ")
                    )));
                }
                requested.to_vec()
            }
            None => changed,
        };

        if files.is_empty() {
            return Ok(UndoSummary::default());
        }

        let summary = self
            .bus
            .undo(config, pre, post, &files)
            .await
            .map_err(remote("undoing changes"))?;

        info!(
            config,
            pre,
            post,
            files = files.len(),
            created = summary.get("create"),
            modified = summary.get("modify"),
            deleted = summary.get("delete"),
            "Undid changes"
        );
        Ok(summary)
    }
}

/// Remove ignored paths from a changed-file list.
///
/// An ignore entry removes an exact match and anything below it.
pub fn exclude_paths(changed: &[String], ignore: &[String]) -> Vec<String> {
    changed
        .iter()
        .filter(|path| !ignore.iter().any(|entry| is_excluded_by(path, entry)))
        .cloned()
        .collect()
}
