//! States enforcing filesystem contents against a snapshot.

use crate::StateReport;
use serde::{Deserialize, Serialize};
use snapctl_snapshot::{
    exclude_paths, FileChange, SnapshotError, SnapshotModule, SnapshotResult, DEFAULT_CONFIG,
    LIVE_STATE,
};
use snapctl_util::TimingGuard;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Arguments of [`SnapshotState::baseline_snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    pub name: String,
    /// Snapshot to enforce. Exactly one of `number` and `tag` must be set.
    #[serde(default)]
    pub number: Option<u32>,
    /// Baseline tag; the newest snapshot carrying it is enforced.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default = "default_config")]
    pub config: String,
    #[serde(default = "default_include_diff")]
    pub include_diff: bool,
    /// Paths left alone. Directories cover everything below them.
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_config() -> String {
    DEFAULT_CONFIG.to_string()
}

fn default_include_diff() -> bool {
    true
}

impl BaselineSnapshot {
    /// Enforce the snapshot with the given number.
    pub fn by_number(name: impl Into<String>, number: u32) -> Self {
        Self {
            name: name.into(),
            number: Some(number),
            tag: None,
            config: default_config(),
            include_diff: true,
            ignore: Vec::new(),
        }
    }

    /// Enforce the newest snapshot carrying `tag`.
    pub fn by_tag(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            number: None,
            ..Self::by_number(name, 0)
        }
    }

    /// Use another snapper config.
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    /// Leave these paths alone.
    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    /// Attach diffs of modified files to the report.
    pub fn with_include_diff(mut self, include_diff: bool) -> Self {
        self.include_diff = include_diff;
        self
    }
}

/// Snapshot states.
pub struct SnapshotState {
    module: Arc<SnapshotModule>,
    /// Report what would change without changing anything.
    test: bool,
}

impl SnapshotState {
    /// Create states that change the system.
    pub fn new(module: Arc<SnapshotModule>) -> Self {
        Self {
            module,
            test: false,
        }
    }

    /// Switch test mode on or off.
    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    /// Enforce that no file changed since a snapshot, undoing any changes.
    ///
    /// Never fails: errors are reported with `result: false`.
    pub async fn baseline_snapshot(&self, args: &BaselineSnapshot) -> StateReport {
        let _timing = TimingGuard::new("state", "baseline_snapshot");
        let report = StateReport::new(&args.name);

        let number = match (args.number, args.tag.as_deref()) {
            (Some(number), None) => number,
            (None, Some(tag)) => match self.module.find_baseline(&args.config, tag).await {
                Ok(Some(snapshot)) => snapshot.id,
                Ok(None) => {
                    return report.failed(format!("No snapshot found with baseline tag '{tag}'"))
                }
                Err(e) => return report.failed(e),
            },
            _ => return report.failed("One of 'number' or 'tag' needs to be specified"),
        };

        match self.enforce(args, number, report.clone()).await {
            Ok(report) => report,
            Err(e) => report.failed(e),
        }
    }

    async fn enforce(
        &self,
        args: &BaselineSnapshot,
        number: u32,
        report: StateReport,
    ) -> SnapshotResult<StateReport> {
        let mut status = self
            .module
            .status_with_diff(&args.config, Some(number), Some(LIVE_STATE), args.include_diff)
            .await?;

        let changed: Vec<String> = status.keys().cloned().collect();
        let files = exclude_paths(&changed, &args.ignore);
        status.retain(|path, _| files.contains(path));
        debug!(
            config = %args.config,
            number,
            changed = changed.len(),
            kept = files.len(),
            "Filtered changes"
        );

        if self.test {
            return Ok(if files.is_empty() {
                report.with_comment("Nothing to be done")
            } else {
                report
                    .pending(format!("{} files changes are set to be undone", files.len()))
                    .with_change("files", files_value(&status)?)
            });
        }

        if files.is_empty() {
            return Ok(report.with_comment("No changes were done"));
        }

        let summary = self
            .module
            .undo(&args.config, Some(number), Some(LIVE_STATE), Some(files.as_slice()))
            .await?;
        info!(config = %args.config, number, files = files.len(), "Baseline enforced");

        Ok(report
            .with_comment(format!("{} files changes were undone", files.len()))
            .with_change("summary", serde_json::to_value(&summary)?)
            .with_change("files", files_value(&status)?))
    }
}

fn files_value(status: &BTreeMap<String, FileChange>) -> SnapshotResult<serde_json::Value> {
    serde_json::to_value(status).map_err(SnapshotError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use snapctl_snapshot::SniffProbe;
    use snapctl_test_utils::{fixtures, BusCall, MockSnapper};

    fn state(bus: &MockSnapper, test: bool) -> SnapshotState {
        let module = SnapshotModule::new(Arc::new(bus.clone()), Arc::new(SniffProbe));
        SnapshotState::new(Arc::new(module)).with_test(test)
    }

    fn undo_calls(bus: &MockSnapper) -> Vec<BusCall> {
        bus.calls()
            .into_iter()
            .filter(|c| matches!(c, BusCall::Undo { .. }))
            .collect()
    }

    fn changed_bus() -> MockSnapper {
        MockSnapper::new()
            .with_snapshots("root", fixtures::snapshots())
            .with_files(42, 0, fixtures::changed_files())
            .with_undo_summary("create:0 modify:1 delete:0")
    }

    #[tokio::test]
    async fn test_requires_number_or_tag() {
        let bus = changed_bus();
        let mut args = BaselineSnapshot::by_number("etc_clean", 42);
        args.tag = Some("golden".into());

        let report = state(&bus, false).baseline_snapshot(&args).await;
        assert_eq!(report.result, Some(false));
        assert_eq!(report.comment, "One of 'number' or 'tag' needs to be specified");
        assert!(bus.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_reports_pending_changes() {
        let bus = changed_bus();
        let args = BaselineSnapshot::by_number("etc_clean", 42).with_include_diff(false);

        let report = state(&bus, true).baseline_snapshot(&args).await;

        assert_eq!(report.result, None);
        assert_eq!(report.comment, "2 files changes are set to be undone");
        assert_eq!(
            report.changes["files"]["/etc/motd"]["status"],
            json!(["modified", "permission changed"])
        );
        assert!(undo_calls(&bus).is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_attaches_live_diffs() {
        let snapshot = tempfile::TempDir::new().unwrap();
        let live = tempfile::TempDir::new().unwrap();
        for (root, motd) in [(&snapshot, "welcome\n"), (&live, "hacked\n")] {
            tokio::fs::create_dir_all(root.path().join("etc")).await.unwrap();
            tokio::fs::write(root.path().join("etc/motd"), motd).await.unwrap();
        }

        let bus = MockSnapper::new()
            .with_snapshots("srv", fixtures::snapshots())
            .with_config(fixtures::config("srv", &live.path().display().to_string()))
            .with_files(42, 0, fixtures::changed_files())
            .with_mount(42, snapshot.path());
        let args = BaselineSnapshot::by_number("etc_clean", 42).with_config("srv");

        let report = state(&bus, true).baseline_snapshot(&args).await;

        assert_eq!(report.result, None);
        let diff = report.changes["files"]["/etc/motd"]["diff"].as_str().unwrap();
        assert!(diff.contains("-welcome\n"));
        assert!(diff.contains("+hacked\n"));
        assert!(report.changes["files"]["/tmp/x"].get("diff").is_none());
        assert_eq!(bus.active_mounts(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_nothing_to_do() {
        let bus = changed_bus();
        let args = BaselineSnapshot::by_number("etc_clean", 42)
            .with_include_diff(false)
            .with_ignore(vec!["/etc".into(), "/tmp/".into()]);

        let report = state(&bus, true).baseline_snapshot(&args).await;
        assert_eq!(report.result, Some(true));
        assert_eq!(report.comment, "Nothing to be done");
        assert!(report.changes.is_empty());
    }

    #[tokio::test]
    async fn test_undo_respects_ignore_list() {
        let bus = changed_bus();
        let args = BaselineSnapshot::by_number("etc_clean", 42)
            .with_include_diff(false)
            .with_ignore(vec!["/tmp".into()]);

        let report = state(&bus, false).baseline_snapshot(&args).await;

        assert_eq!(report.result, Some(true));
        assert_eq!(report.changes["summary"], json!({"create": 0, "modify": 1, "delete": 0}));
        assert!(report.changes["files"].get("/tmp/x").is_none());
        assert_eq!(
            undo_calls(&bus),
            vec![BusCall::Undo {
                config: "root".into(),
                pre: 42,
                post: 0,
                files: vec!["/etc/motd".into()],
            }]
        );
    }

    #[tokio::test]
    async fn test_no_changes() {
        let bus = MockSnapper::new()
            .with_snapshots("root", fixtures::snapshots())
            .with_files(42, 0, Vec::new());

        let report = state(&bus, false)
            .baseline_snapshot(&BaselineSnapshot::by_number("etc_clean", 42))
            .await;
        assert_eq!(report.result, Some(true));
        assert_eq!(report.comment, "No changes were done");
    }

    #[tokio::test]
    async fn test_resolves_tag_to_newest_baseline() {
        let bus = changed_bus();
        let state = state(&bus, true);
        let first = state.module.create_baseline("root", "golden", None).await.unwrap();
        let second = state.module.create_baseline("root", "golden", None).await.unwrap();
        assert!(second > first);

        let bus = bus.with_files(second, 0, fixtures::changed_files());
        let args = BaselineSnapshot::by_tag("etc_clean", "golden").with_include_diff(false);
        let report = state.baseline_snapshot(&args).await;

        assert_eq!(report.result, None);
        assert!(bus.calls().contains(&BusCall::CreateComparison {
            config: "root".into(),
            pre: second,
            post: 0,
        }));
    }

    #[tokio::test]
    async fn test_unknown_tag_fails() {
        let bus = changed_bus();
        let report = state(&bus, false)
            .baseline_snapshot(&BaselineSnapshot::by_tag("etc_clean", "golden"))
            .await;
        assert_eq!(report.result, Some(false));
        assert!(report.comment.contains("golden"));
    }

    #[tokio::test]
    async fn test_remote_errors_become_failed_reports() {
        let bus = MockSnapper::new();
        let report = state(&bus, false)
            .baseline_snapshot(&BaselineSnapshot::by_number("etc_clean", 42))
            .await;
        assert_eq!(report.result, Some(false));
        assert_eq!(
            report.comment,
            "Error encountered while listing changed files: Unknown configuration"
        );
    }
}
