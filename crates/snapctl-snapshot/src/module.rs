//! The snapshot execution module.

use crate::error::remote;
use crate::probe::{ContentProbe, FileCommandProbe};
use crate::{
    ConfigUpdate, OperationRegistry, SnapperConfig, SnapperSettings, SnapshotError, SnapshotKind,
    SnapshotRecord, SnapshotRequest, SnapshotResult, BASELINE_TAG_KEY,
};
use snapctl_bus::{
    ChangedFile, DbusSnapper, SharedBus, LIVE_STATE, SNAPPER_COMMAND, SNAPPER_SERVICE,
};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the host offers besides the bus connection itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HostCapabilities {
    /// snapperd is running or activatable.
    pub service: bool,
    /// The `snapper` tool that performs undo is installed.
    pub undo_tool: bool,
    /// The `file` utility used to classify diff candidates is installed.
    pub file_probe: bool,
}

impl HostCapabilities {
    fn check(self) -> SnapshotResult<()> {
        let missing = if !self.service {
            format!("{SNAPPER_SERVICE} is not available")
        } else if !self.undo_tool {
            format!("missing {SNAPPER_COMMAND}")
        } else if !self.file_probe {
            "missing the 'file' utility".to_string()
        } else {
            return Ok(());
        };
        Err(SnapshotError::unavailable(format!(
            "the snapper module cannot be loaded: {missing}"
        )))
    }
}

/// Filesystem snapshot operations backed by the snapper daemon.
///
/// Every call re-queries the daemon; nothing is cached between calls.
pub struct SnapshotModule {
    pub(crate) bus: SharedBus,
    pub(crate) probe: Arc<dyn ContentProbe>,
    pub(crate) operations: OperationRegistry,
}

impl SnapshotModule {
    /// Create a module on an existing bus client.
    pub fn new(bus: SharedBus, probe: Arc<dyn ContentProbe>) -> Self {
        Self {
            bus,
            probe,
            operations: OperationRegistry::with_builtins(),
        }
    }

    /// Replace the operations available to wrapped runs.
    pub fn with_operations(mut self, operations: OperationRegistry) -> Self {
        self.operations = operations;
        self
    }

    /// Connect to the system bus and check the host can serve this module.
    ///
    /// Fails with [`SnapshotError::CapabilityUnavailable`] when snapperd is
    /// neither running nor activatable, or when the `snapper` tool or the
    /// `file` utility is missing.
    pub async fn load() -> SnapshotResult<Self> {
        let bus = DbusSnapper::connect().await.map_err(|e| {
            SnapshotError::unavailable(format!("cannot reach the system bus: {e}"))
        })?;

        let service = bus.is_service_available().await.map_err(|e| {
            SnapshotError::unavailable(format!("cannot query the system bus: {e}"))
        })?;
        HostCapabilities {
            service,
            undo_tool: DbusSnapper::is_undo_available().await,
            file_probe: FileCommandProbe::is_available().await,
        }
        .check()?;

        info!("Snapper module loaded");
        Ok(Self::new(Arc::new(bus), Arc::new(FileCommandProbe)))
    }

    /// Operations available to wrapped runs.
    pub fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    /// List available snapshots.
    pub async fn list_snapshots(&self, config: &str) -> SnapshotResult<Vec<SnapshotRecord>> {
        self.bus
            .list_snapshots(config)
            .await
            .map_err(remote("listing snapshots"))?
            .into_iter()
            .map(SnapshotRecord::from_raw)
            .collect()
    }

    /// Get detailed information about a given snapshot.
    pub async fn get_snapshot(&self, config: &str, number: u32) -> SnapshotResult<SnapshotRecord> {
        let raw = self
            .bus
            .get_snapshot(config, number)
            .await
            .map_err(remote("retrieving snapshot"))?;
        SnapshotRecord::from_raw(raw)
    }

    /// List all configs with their settings, keyed by config name.
    pub async fn list_configs(&self) -> SnapshotResult<BTreeMap<String, SnapperSettings>> {
        let configs = self
            .bus
            .list_configs()
            .await
            .map_err(remote("listing configurations"))?;

        Ok(configs
            .into_iter()
            .map(|c| (c.name, SnapperSettings::from_map(&c.settings)))
            .collect())
    }

    /// Get a config with its subvolume and settings.
    pub async fn get_config(&self, name: &str) -> SnapshotResult<SnapperConfig> {
        let config = self
            .bus
            .get_config(name)
            .await
            .map_err(remote("retrieving configuration"))?;

        Ok(SnapperConfig {
            name: config.name,
            subvolume: config.subvolume,
            settings: SnapperSettings::from_map(&config.settings),
        })
    }

    /// Set configuration values. Keys are upper-cased, booleans become `yes`/`no`.
    pub async fn set_config(&self, name: &str, update: &ConfigUpdate) -> SnapshotResult<()> {
        if update.is_empty() {
            return Err(SnapshotError::invalid_argument("no configuration values given"));
        }

        let settings = update.normalize();
        self.bus
            .set_config(name, &settings)
            .await
            .map_err(remote(format!("setting configuration {name}")))?;

        info!(config = name, keys = settings.len(), "Configuration updated");
        Ok(())
    }

    /// Create a snapshot and return its number.
    pub async fn create_snapshot(
        &self,
        config: &str,
        request: &SnapshotRequest,
    ) -> SnapshotResult<u32> {
        let description = request.effective_description();
        let cleanup = request.cleanup_algorithm.as_str();
        let userdata = request.effective_userdata();

        let created = match request.kind {
            SnapshotKind::Single => {
                self.bus
                    .create_single_snapshot(config, &description, cleanup, &userdata)
                    .await
            }
            SnapshotKind::Pre => {
                self.bus
                    .create_pre_snapshot(config, &description, cleanup, &userdata)
                    .await
            }
            SnapshotKind::Post => {
                let pre_number = request.pre_number.ok_or_else(|| {
                    SnapshotError::invalid_argument(
                        "pre snapshot number 'pre_number' needs to be specified for \
                         snapshots of the 'post' type",
                    )
                })?;
                self.bus
                    .create_post_snapshot(config, pre_number, &description, cleanup, &userdata)
                    .await
            }
        };

        let number = created.map_err(remote("creating snapshot"))?;
        info!(
            config,
            number,
            kind = %request.kind,
            job_id = request.job_id.as_deref(),
            "Created snapshot"
        );
        Ok(number)
    }

    /// Delete snapshots and return the numbers deleted.
    pub async fn delete_snapshots(&self, config: &str, numbers: &[u32]) -> SnapshotResult<Vec<u32>> {
        if numbers.is_empty() {
            return Err(SnapshotError::invalid_argument("no snapshot numbers given"));
        }
        if numbers.contains(&LIVE_STATE) {
            return Err(SnapshotError::invalid_argument(
                "snapshot 0 is the live filesystem and cannot be deleted",
            ));
        }

        self.bus
            .delete_snapshots(config, numbers)
            .await
            .map_err(remote("deleting snapshots"))?;

        info!(config, ?numbers, "Deleted snapshots");
        Ok(numbers.to_vec())
    }

    /// Get the most recently created snapshot (the highest number).
    pub async fn last_snapshot(&self, config: &str) -> SnapshotResult<SnapshotRecord> {
        self.list_snapshots(config)
            .await?
            .into_iter()
            .max_by_key(|s| s.id)
            .ok_or_else(|| {
                SnapshotError::invalid_argument(format!("config '{config}' has no snapshots"))
            })
    }

    /// Resolve an interval for diff, status and undo.
    ///
    /// An omitted upper bound means the live filesystem ([`LIVE_STATE`]); an
    /// omitted lower bound means the latest snapshot.
    pub async fn resolve_interval(
        &self,
        config: &str,
        pre: Option<u32>,
        post: Option<u32>,
    ) -> SnapshotResult<(u32, u32)> {
        let post = post.unwrap_or(LIVE_STATE);
        let pre = match pre {
            Some(pre) => pre,
            None => self.last_snapshot(config).await?.id,
        };
        debug!(config, pre, post, "Resolved interval");
        Ok((pre, post))
    }

    /// Create a comparison and list its files.
    pub(crate) async fn compare(
        &self,
        config: &str,
        pre: u32,
        post: u32,
    ) -> SnapshotResult<Vec<ChangedFile>> {
        self.bus
            .create_comparison(config, pre, post)
            .await
            .map_err(remote("listing changed files"))?;
        self.bus
            .get_files(config, pre, post)
            .await
            .map_err(remote("listing changed files"))
    }

    /// List the paths that changed between two snapshots.
    pub async fn changed_files(
        &self,
        config: &str,
        pre: Option<u32>,
        post: Option<u32>,
    ) -> SnapshotResult<Vec<String>> {
        let (pre, post) = self.resolve_interval(config, pre, post).await?;
        Ok(self
            .compare(config, pre, post)
            .await?
            .into_iter()
            .map(|f| f.path)
            .collect())
    }

    /// Create a `single` snapshot tagged as a named baseline.
    pub async fn create_baseline(
        &self,
        config: &str,
        tag: &str,
        description: Option<&str>,
    ) -> SnapshotResult<u32> {
        let mut userdata = HashMap::new();
        userdata.insert(BASELINE_TAG_KEY.to_string(), tag.to_string());

        let request = SnapshotRequest::single()
            .with_description(description.unwrap_or("baseline snapshot"))
            .with_userdata(userdata);
        self.create_snapshot(config, &request).await
    }

    /// Find the newest snapshot carrying a baseline tag.
    pub async fn find_baseline(
        &self,
        config: &str,
        tag: &str,
    ) -> SnapshotResult<Option<SnapshotRecord>> {
        Ok(self
            .list_snapshots(config)
            .await?
            .into_iter()
            .filter(|s| s.baseline_tag() == Some(tag))
            .max_by_key(|s| s.id))
    }

    /// Mount a snapshot.
    ///
    /// The live state needs no mount: it is the config's subvolume, which is
    /// the root the daemon reports changed paths against.
    pub(crate) async fn mount(&self, config: &str, number: u32) -> SnapshotResult<PathBuf> {
        if number == LIVE_STATE {
            let subvolume = self.get_config(config).await?.subvolume;
            debug!(config, subvolume = %subvolume, "Using live subvolume");
            return Ok(PathBuf::from(subvolume));
        }

        let mount = self
            .bus
            .mount_snapshot(config, number, false)
            .await
            .map_err(remote(format!("mounting snapshot {number}")))?;
        debug!(config, number, mount = %mount, "Mounted snapshot");
        Ok(PathBuf::from(mount))
    }

    pub(crate) async fn unmount(&self, config: &str, number: u32) -> SnapshotResult<()> {
        if number == LIVE_STATE {
            return Ok(());
        }

        self.bus
            .umount_snapshot(config, number, false)
            .await
            .map_err(remote(format!("unmounting snapshot {number}")))?;
        debug!(config, number, "Unmounted snapshot");
        Ok(())
    }

    /// Unmount every number, reporting the first failure after trying all.
    pub(crate) async fn unmount_all(&self, config: &str, numbers: &[u32]) -> SnapshotResult<()> {
        let mut first_error = None;
        for &number in numbers {
            if let Err(e) = self.unmount(config, number).await {
                warn!(config, number, error = %e, "Failed to unmount snapshot");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SniffProbe;
    use snapctl_test_utils::{fixtures, BusCall, MockSnapper};

    fn module(bus: &MockSnapper) -> SnapshotModule {
        SnapshotModule::new(Arc::new(bus.clone()), Arc::new(SniffProbe))
    }

    #[tokio::test]
    async fn test_list_snapshots() {
        let bus = MockSnapper::new().with_snapshots("root", fixtures::snapshots());
        let snapshots = module(&bus).list_snapshots("root").await.unwrap();

        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].id, 42);
        assert_eq!(snapshots[0].kind, SnapshotKind::Pre);
        assert_eq!(snapshots[0].pre, None);
        assert_eq!(snapshots[1].kind, SnapshotKind::Post);
        assert_eq!(snapshots[1].pre, Some(42));
        assert_eq!(snapshots[1].userdata["userdata2"], "userval2");
    }

    #[tokio::test]
    async fn test_get_snapshot() {
        let bus = MockSnapper::new().with_snapshots("root", fixtures::snapshots());
        let module = module(&bus);

        let snapshot = module.get_snapshot("root", 43).await.unwrap();
        assert_eq!(snapshot.description, "Blah Blah");

        let err = module.get_snapshot("root", 99).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error encountered while retrieving snapshot: Invalid snapshot"
        );
    }

    #[tokio::test]
    async fn test_unknown_config() {
        let bus = MockSnapper::new();
        let err = module(&bus).list_snapshots("home").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error encountered while listing snapshots: Unknown configuration"
        );
    }

    #[tokio::test]
    async fn test_list_and_get_configs() {
        let bus = MockSnapper::new().with_config(fixtures::root_config());
        let module = module(&bus);

        let configs = module.list_configs().await.unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs["root"].fstype.as_deref(), Some("btrfs"));

        let config = module.get_config("root").await.unwrap();
        assert_eq!(config.subvolume, "/");
        assert_eq!(config.settings.number_limit.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_set_config_sends_normalized_values() {
        let bus = MockSnapper::new().with_config(fixtures::root_config());
        let update = ConfigUpdate::new()
            .set("sync_acl", true)
            .set("foo", false)
            .set("bar", 12i64);

        module(&bus).set_config("root", &update).await.unwrap();

        let calls = bus.calls();
        let BusCall::SetConfig { name, settings } = &calls[0] else {
            panic!("expected SetConfig, got {:?}", calls[0]);
        };
        assert_eq!(name, "root");
        assert_eq!(settings["SYNC_ACL"], "yes");
        assert_eq!(settings["FOO"], "no");
        assert_eq!(settings["BAR"], "12");
    }

    #[tokio::test]
    async fn test_create_snapshot_types() {
        let bus = MockSnapper::new().with_snapshots("root", Vec::new());
        let module = module(&bus);

        let single = module
            .create_snapshot("root", &SnapshotRequest::single())
            .await
            .unwrap();
        let pre = module
            .create_snapshot("root", &SnapshotRequest::pre().with_job_id("job_7"))
            .await
            .unwrap();
        let post = module
            .create_snapshot("root", &SnapshotRequest::post(pre))
            .await
            .unwrap();
        assert!(single < pre && pre < post);

        let record = module.get_snapshot("root", pre).await.unwrap();
        assert_eq!(record.job_id(), Some("job_7"));
        assert_eq!(record.description, "job job_7");
        assert_eq!(record.cleanup, "number");

        let post_record = module.get_snapshot("root", post).await.unwrap();
        assert_eq!(post_record.pre, Some(pre));
    }

    #[tokio::test]
    async fn test_post_snapshot_requires_pre_number() {
        let bus = MockSnapper::new().with_snapshots("root", Vec::new());
        let request = SnapshotRequest {
            kind: SnapshotKind::Post,
            ..SnapshotRequest::default()
        };

        let err = module(&bus)
            .create_snapshot("root", &request)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidArgument(_)));
        assert!(bus.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_snapshots() {
        let bus = MockSnapper::new().with_snapshots("root", fixtures::snapshots());
        let module = module(&bus);

        assert_eq!(module.delete_snapshots("root", &[42]).await.unwrap(), vec![42]);
        assert_eq!(bus.snapshots("root").len(), 1);
        assert!(module.delete_snapshots("root", &[0]).await.is_err());
        assert!(module.delete_snapshots("root", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_interval_defaults() {
        let bus = MockSnapper::new().with_snapshots("root", fixtures::snapshots());
        let module = module(&bus);

        assert_eq!(module.resolve_interval("root", None, None).await.unwrap(), (43, 0));
        assert_eq!(
            module.resolve_interval("root", None, Some(50)).await.unwrap(),
            (43, 50)
        );
        assert_eq!(
            module.resolve_interval("root", Some(42), Some(50)).await.unwrap(),
            (42, 50)
        );
    }

    #[tokio::test]
    async fn test_resolve_interval_without_snapshots() {
        let bus = MockSnapper::new().with_snapshots("root", Vec::new());
        let err = module(&bus)
            .resolve_interval("root", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_changed_files() {
        let bus = MockSnapper::new()
            .with_snapshots("root", fixtures::snapshots())
            .with_files(42, 43, fixtures::changed_files());

        let files = module(&bus)
            .changed_files("root", Some(42), Some(43))
            .await
            .unwrap();
        assert_eq!(files, vec!["/etc/motd", "/tmp/x"]);
        assert_eq!(
            bus.calls()[0],
            BusCall::CreateComparison {
                config: "root".into(),
                pre: 42,
                post: 43
            }
        );
    }

    #[tokio::test]
    async fn test_baselines() {
        let bus = MockSnapper::new().with_snapshots("root", fixtures::snapshots());
        let module = module(&bus);

        assert!(module.find_baseline("root", "golden").await.unwrap().is_none());

        let first = module.create_baseline("root", "golden", None).await.unwrap();
        let second = module
            .create_baseline("root", "golden", Some("after patching"))
            .await
            .unwrap();
        module.create_baseline("root", "other", None).await.unwrap();

        let found = module.find_baseline("root", "golden").await.unwrap().unwrap();
        assert!(second > first);
        assert_eq!(found.id, second);
        assert_eq!(found.kind, SnapshotKind::Single);
        assert_eq!(found.description, "after patching");
    }

    #[tokio::test]
    async fn test_live_state_is_config_subvolume() {
        let bus = MockSnapper::new()
            .with_config(fixtures::root_config())
            .with_config(fixtures::config("home", "/home"));
        let module = module(&bus);

        assert_eq!(module.mount("root", 0).await.unwrap(), PathBuf::from("/"));
        assert_eq!(module.mount("home", 0).await.unwrap(), PathBuf::from("/home"));
        module.unmount("home", 0).await.unwrap();

        assert!(bus.calls().iter().all(|c| c.method() == "get_config"));
        assert_eq!(bus.active_mounts(), 0);
    }

    #[tokio::test]
    async fn test_live_state_unknown_config() {
        let bus = MockSnapper::new();
        let err = module(&bus).mount("home", 0).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error encountered while retrieving configuration: Unknown configuration"
        );
    }

    #[test]
    fn test_host_capabilities() {
        let all = HostCapabilities {
            service: true,
            undo_tool: true,
            file_probe: true,
        };
        assert!(all.check().is_ok());

        let err = HostCapabilities {
            undo_tool: false,
            ..all
        }
        .check()
        .unwrap_err();
        assert!(matches!(err, SnapshotError::CapabilityUnavailable(_)));
        assert_eq!(
            err.to_string(),
            "Capability unavailable: the snapper module cannot be loaded: missing snapper"
        );

        let err = HostCapabilities {
            service: false,
            file_probe: false,
            ..all
        }
        .check()
        .unwrap_err();
        assert!(err.to_string().ends_with("org.opensuse.Snapper is not available"));

        let err = HostCapabilities {
            file_probe: false,
            ..all
        }
        .check()
        .unwrap_err();
        assert!(err.to_string().ends_with("missing the 'file' utility"));
    }
}
