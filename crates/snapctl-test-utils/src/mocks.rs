//! Mock implementations for testing.
//!
//! [`MockSnapper`] stands in for snapperd: it keeps snapshots and configs in
//! memory, serves programmable comparisons and mount points, and records
//! every call so tests can assert on ordering and arguments.

use async_trait::async_trait;
use snapctl_bus::{
    BusError, BusResult, ChangedFile, ConfigInfo, RawSnapshot, SnapperBus, UndoSummary,
    ILLEGAL_SNAPSHOT, LIVE_STATE, UNKNOWN_CONFIG,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Error name snapperd replies with when files are listed before comparing.
pub const NO_COMPARISON: &str = "error.no_comparison";

/// A recorded bus call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    ListSnapshots {
        config: String,
    },
    GetSnapshot {
        config: String,
        number: u32,
    },
    ListConfigs,
    GetConfig {
        name: String,
    },
    SetConfig {
        name: String,
        settings: HashMap<String, String>,
    },
    CreateSingleSnapshot {
        config: String,
        description: String,
        cleanup: String,
        userdata: HashMap<String, String>,
    },
    CreatePreSnapshot {
        config: String,
        description: String,
        cleanup: String,
        userdata: HashMap<String, String>,
    },
    CreatePostSnapshot {
        config: String,
        pre_number: u32,
        description: String,
        cleanup: String,
        userdata: HashMap<String, String>,
    },
    DeleteSnapshots {
        config: String,
        numbers: Vec<u32>,
    },
    CreateComparison {
        config: String,
        pre: u32,
        post: u32,
    },
    GetFiles {
        config: String,
        pre: u32,
        post: u32,
    },
    MountSnapshot {
        config: String,
        number: u32,
    },
    UmountSnapshot {
        config: String,
        number: u32,
    },
    Undo {
        config: String,
        pre: u32,
        post: u32,
        files: Vec<String>,
    },
}

impl BusCall {
    /// Name of the trait method this call went through.
    pub fn method(&self) -> &'static str {
        match self {
            Self::ListSnapshots { .. } => "list_snapshots",
            Self::GetSnapshot { .. } => "get_snapshot",
            Self::ListConfigs => "list_configs",
            Self::GetConfig { .. } => "get_config",
            Self::SetConfig { .. } => "set_config",
            Self::CreateSingleSnapshot { .. } => "create_single_snapshot",
            Self::CreatePreSnapshot { .. } => "create_pre_snapshot",
            Self::CreatePostSnapshot { .. } => "create_post_snapshot",
            Self::DeleteSnapshots { .. } => "delete_snapshots",
            Self::CreateComparison { .. } => "create_comparison",
            Self::GetFiles { .. } => "get_files",
            Self::MountSnapshot { .. } => "mount_snapshot",
            Self::UmountSnapshot { .. } => "umount_snapshot",
            Self::Undo { .. } => "undo",
        }
    }

    /// Config the call was made against. `None` for `list_configs`.
    pub fn config(&self) -> Option<&str> {
        match self {
            Self::ListConfigs => None,
            Self::GetConfig { name } | Self::SetConfig { name, .. } => Some(name),
            Self::ListSnapshots { config }
            | Self::GetSnapshot { config, .. }
            | Self::CreateSingleSnapshot { config, .. }
            | Self::CreatePreSnapshot { config, .. }
            | Self::CreatePostSnapshot { config, .. }
            | Self::DeleteSnapshots { config, .. }
            | Self::CreateComparison { config, .. }
            | Self::GetFiles { config, .. }
            | Self::MountSnapshot { config, .. }
            | Self::UmountSnapshot { config, .. }
            | Self::Undo { config, .. } => Some(config),
        }
    }
}

#[derive(Default)]
struct MockState {
    /// Snapshots per config. A config is known once it has an entry here.
    snapshots: BTreeMap<String, Vec<RawSnapshot>>,
    configs: BTreeMap<String, ConfigInfo>,
    /// Comparison results keyed by (pre, post).
    files: HashMap<(u32, u32), Vec<ChangedFile>>,
    comparisons: HashSet<(String, u32, u32)>,
    /// Mount points keyed by snapshot number.
    mount_points: HashMap<u32, PathBuf>,
    /// Outstanding mounts per snapshot number.
    mounted: HashMap<u32, usize>,
    /// Error names to reply with, keyed by method.
    failures: HashMap<String, String>,
    undo_summary: UndoSummary,
    calls: Vec<BusCall>,
}

/// An in-memory snapper daemon.
///
/// # Example
///
/// ```rust
/// use snapctl_test_utils::{fixtures, MockSnapper};
///
/// let bus = MockSnapper::new()
///     .with_snapshots("root", fixtures::snapshots())
///     .with_files(42, 43, fixtures::changed_files())
///     .fail_on("undo", "error.illegal_snapshot");
///
/// assert!(bus.calls().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct MockSnapper {
    state: Arc<Mutex<MockState>>,
}

impl MockSnapper {
    /// Create a daemon that knows no configs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `config` known with the given snapshots.
    pub fn with_snapshots(self, config: &str, snapshots: Vec<RawSnapshot>) -> Self {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .insert(config.to_string(), snapshots);
        self
    }

    /// Add a config. Its snapshot list starts empty unless already set.
    pub fn with_config(self, config: ConfigInfo) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.snapshots.entry(config.name.clone()).or_default();
            state.configs.insert(config.name.clone(), config);
        }
        self
    }

    /// Set the comparison result for a snapshot pair.
    pub fn with_files(self, pre: u32, post: u32, files: Vec<ChangedFile>) -> Self {
        self.state.lock().unwrap().files.insert((pre, post), files);
        self
    }

    /// Set the directory a snapshot mounts at.
    pub fn with_mount(self, number: u32, path: impl AsRef<Path>) -> Self {
        self.state
            .lock()
            .unwrap()
            .mount_points
            .insert(number, path.as_ref().to_path_buf());
        self
    }

    /// Set the summary returned by `undo`.
    ///
    /// # Panics
    ///
    /// Panics if `output` is not a `create:N modify:N delete:N` line.
    pub fn with_undo_summary(self, output: &str) -> Self {
        self.state.lock().unwrap().undo_summary =
            UndoSummary::parse(output).expect("invalid undo summary");
        self
    }

    /// Make `method` fail with the daemon error `error_name`.
    pub fn fail_on(self, method: &str, error_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(method.to_string(), error_name.to_string());
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BusCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of mounts not yet released.
    pub fn active_mounts(&self) -> usize {
        self.state.lock().unwrap().mounted.values().sum()
    }

    /// Snapshots currently held for `config`.
    pub fn snapshots(&self, config: &str) -> Vec<RawSnapshot> {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .get(config)
            .cloned()
            .unwrap_or_default()
    }

    /// Record a call and apply any configured failure, then run `f` on the state.
    fn call<T>(
        &self,
        call: BusCall,
        f: impl FnOnce(&mut MockState) -> BusResult<T>,
    ) -> BusResult<T> {
        let mut state = self.state.lock().unwrap();
        let method = call.method();
        let config = call.config().map(str::to_string);
        state.calls.push(call);

        if let Some(name) = state.failures.get(method) {
            return Err(BusError::remote(name));
        }
        if let Some(config) = config {
            if !state.snapshots.contains_key(&config) {
                return Err(BusError::remote(UNKNOWN_CONFIG));
            }
        }
        f(&mut state)
    }

    fn create(
        &self,
        call: BusCall,
        kind: u16,
        pre_number: u32,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> BusResult<u32> {
        let config = call.config().unwrap_or_default().to_string();
        self.call(call, |state| {
            let snapshots = state.snapshots.entry(config).or_default();
            if kind == 2 && !snapshots.iter().any(|s| s.number == pre_number) {
                return Err(BusError::remote(ILLEGAL_SNAPSHOT));
            }

            let number = snapshots.iter().map(|s| s.number).max().unwrap_or(0) + 1;
            snapshots.push(RawSnapshot {
                number,
                kind,
                pre_number,
                date: 1457006600 + i64::from(number),
                uid: 0,
                description: description.to_string(),
                cleanup: cleanup.to_string(),
                userdata: userdata.clone(),
            });
            Ok(number)
        })
    }
}

fn known(state: &MockState, config: &str, number: u32) -> BusResult<()> {
    let exists = number == LIVE_STATE
        || state
            .snapshots
            .get(config)
            .is_some_and(|s| s.iter().any(|s| s.number == number));
    if exists {
        Ok(())
    } else {
        Err(BusError::remote(ILLEGAL_SNAPSHOT))
    }
}

#[async_trait]
impl SnapperBus for MockSnapper {
    async fn list_snapshots(&self, config: &str) -> BusResult<Vec<RawSnapshot>> {
        let call = BusCall::ListSnapshots {
            config: config.to_string(),
        };
        self.call(call, |state| Ok(state.snapshots[config].clone()))
    }

    async fn get_snapshot(&self, config: &str, number: u32) -> BusResult<RawSnapshot> {
        let call = BusCall::GetSnapshot {
            config: config.to_string(),
            number,
        };
        self.call(call, |state| {
            state.snapshots[config]
                .iter()
                .find(|s| s.number == number)
                .cloned()
                .ok_or_else(|| BusError::remote(ILLEGAL_SNAPSHOT))
        })
    }

    async fn list_configs(&self) -> BusResult<Vec<ConfigInfo>> {
        self.call(BusCall::ListConfigs, |state| {
            Ok(state.configs.values().cloned().collect())
        })
    }

    async fn get_config(&self, name: &str) -> BusResult<ConfigInfo> {
        let call = BusCall::GetConfig {
            name: name.to_string(),
        };
        self.call(call, |state| {
            state
                .configs
                .get(name)
                .cloned()
                .ok_or_else(|| BusError::remote(UNKNOWN_CONFIG))
        })
    }

    async fn set_config(&self, name: &str, settings: &HashMap<String, String>) -> BusResult<()> {
        let call = BusCall::SetConfig {
            name: name.to_string(),
            settings: settings.clone(),
        };
        self.call(call, |state| {
            let config = state
                .configs
                .get_mut(name)
                .ok_or_else(|| BusError::remote(UNKNOWN_CONFIG))?;
            config.settings.extend(settings.clone());
            Ok(())
        })
    }

    async fn create_single_snapshot(
        &self,
        config: &str,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> BusResult<u32> {
        let call = BusCall::CreateSingleSnapshot {
            config: config.to_string(),
            description: description.to_string(),
            cleanup: cleanup.to_string(),
            userdata: userdata.clone(),
        };
        self.create(call, 0, 0, description, cleanup, userdata)
    }

    async fn create_pre_snapshot(
        &self,
        config: &str,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> BusResult<u32> {
        let call = BusCall::CreatePreSnapshot {
            config: config.to_string(),
            description: description.to_string(),
            cleanup: cleanup.to_string(),
            userdata: userdata.clone(),
        };
        self.create(call, 1, 0, description, cleanup, userdata)
    }

    async fn create_post_snapshot(
        &self,
        config: &str,
        pre_number: u32,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> BusResult<u32> {
        let call = BusCall::CreatePostSnapshot {
            config: config.to_string(),
            pre_number,
            description: description.to_string(),
            cleanup: cleanup.to_string(),
            userdata: userdata.clone(),
        };
        self.create(call, 2, pre_number, description, cleanup, userdata)
    }

    async fn delete_snapshots(&self, config: &str, numbers: &[u32]) -> BusResult<()> {
        let call = BusCall::DeleteSnapshots {
            config: config.to_string(),
            numbers: numbers.to_vec(),
        };
        self.call(call, |state| {
            for &number in numbers {
                known(state, config, number)?;
            }
            if let Some(snapshots) = state.snapshots.get_mut(config) {
                snapshots.retain(|s| !numbers.contains(&s.number));
            }
            Ok(())
        })
    }

    async fn create_comparison(&self, config: &str, pre: u32, post: u32) -> BusResult<()> {
        let call = BusCall::CreateComparison {
            config: config.to_string(),
            pre,
            post,
        };
        self.call(call, |state| {
            known(state, config, pre)?;
            known(state, config, post)?;
            state.comparisons.insert((config.to_string(), pre, post));
            Ok(())
        })
    }

    async fn get_files(&self, config: &str, pre: u32, post: u32) -> BusResult<Vec<ChangedFile>> {
        let call = BusCall::GetFiles {
            config: config.to_string(),
            pre,
            post,
        };
        self.call(call, |state| {
            if !state.comparisons.contains(&(config.to_string(), pre, post)) {
                return Err(BusError::remote(NO_COMPARISON));
            }
            Ok(state.files.get(&(pre, post)).cloned().unwrap_or_default())
        })
    }

    async fn mount_snapshot(
        &self,
        config: &str,
        number: u32,
        _user_request: bool,
    ) -> BusResult<String> {
        let call = BusCall::MountSnapshot {
            config: config.to_string(),
            number,
        };
        self.call(call, |state| {
            known(state, config, number)?;
            let path = state
                .mount_points
                .get(&number)
                .cloned()
                .ok_or_else(|| BusError::remote(ILLEGAL_SNAPSHOT))?;
            *state.mounted.entry(number).or_default() += 1;
            Ok(path.display().to_string())
        })
    }

    async fn umount_snapshot(
        &self,
        config: &str,
        number: u32,
        _user_request: bool,
    ) -> BusResult<()> {
        let call = BusCall::UmountSnapshot {
            config: config.to_string(),
            number,
        };
        self.call(call, |state| match state.mounted.get_mut(&number) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Ok(())
            }
            _ => Err(BusError::remote(ILLEGAL_SNAPSHOT)),
        })
    }

    async fn undo(
        &self,
        config: &str,
        pre: u32,
        post: u32,
        files: &[String],
    ) -> BusResult<UndoSummary> {
        let call = BusCall::Undo {
            config: config.to_string(),
            pre,
            post,
            files: files.to_vec(),
        };
        self.call(call, |state| {
            known(state, config, pre)?;
            known(state, config, post)?;
            Ok(state.undo_summary.clone())
        })
    }
}
