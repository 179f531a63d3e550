//! D-Bus implementation of [`SnapperBus`].

use crate::{BusError, BusResult, ChangedFile, ConfigInfo, RawSnapshot, SnapperBus, UndoSummary};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::process::Command;
use tracing::{debug, info};
use zbus::{proxy, Connection};

/// Well-known bus name of snapperd.
pub const SNAPPER_SERVICE: &str = "org.opensuse.Snapper";

/// Client tool that reverts changes; snapperd has no undo method.
pub const SNAPPER_COMMAND: &str = "snapper";

/// `(number, type, pre_number, date, uid, description, cleanup, userdata)`
type SnapshotTuple = (u32, u16, u32, i64, u32, String, String, HashMap<String, String>);

/// `(name, subvolume, settings)`
type ConfigTuple = (String, String, HashMap<String, String>);

#[proxy(
    interface = "org.opensuse.Snapper",
    default_service = "org.opensuse.Snapper",
    default_path = "/org/opensuse/Snapper"
)]
trait Snapper {
    fn list_snapshots(&self, config_name: &str) -> zbus::Result<Vec<SnapshotTuple>>;

    fn get_snapshot(&self, config_name: &str, number: u32) -> zbus::Result<SnapshotTuple>;

    fn list_configs(&self) -> zbus::Result<Vec<ConfigTuple>>;

    fn get_config(&self, config_name: &str) -> zbus::Result<ConfigTuple>;

    fn set_config(&self, config_name: &str, raw: &HashMap<String, String>) -> zbus::Result<()>;

    fn create_single_snapshot(
        &self,
        config_name: &str,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> zbus::Result<u32>;

    fn create_pre_snapshot(
        &self,
        config_name: &str,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> zbus::Result<u32>;

    fn create_post_snapshot(
        &self,
        config_name: &str,
        pre_number: u32,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> zbus::Result<u32>;

    fn delete_snapshots(&self, config_name: &str, numbers: &[u32]) -> zbus::Result<()>;

    fn create_comparison(&self, config_name: &str, number1: u32, number2: u32)
        -> zbus::Result<()>;

    fn get_files(
        &self,
        config_name: &str,
        number1: u32,
        number2: u32,
    ) -> zbus::Result<Vec<(String, u32)>>;

    fn mount_snapshot(
        &self,
        config_name: &str,
        number: u32,
        user_request: bool,
    ) -> zbus::Result<String>;

    fn umount_snapshot(&self, config_name: &str, number: u32, user_request: bool)
        -> zbus::Result<()>;
}

fn snapshot_from_tuple(t: SnapshotTuple) -> RawSnapshot {
    RawSnapshot {
        number: t.0,
        kind: t.1,
        pre_number: t.2,
        date: t.3,
        uid: t.4,
        description: t.5,
        cleanup: t.6,
        userdata: t.7,
    }
}

fn config_from_tuple(t: ConfigTuple) -> ConfigInfo {
    ConfigInfo {
        name: t.0,
        subvolume: t.1,
        settings: t.2,
    }
}

/// Snapper client over the system bus.
///
/// The connection is opened once and shared by every call; each call is an
/// independent request with no transaction spanning several calls.
pub struct DbusSnapper {
    connection: Connection,
    proxy: SnapperProxy<'static>,
}

impl DbusSnapper {
    /// Connect to the system bus.
    pub async fn connect() -> BusResult<Self> {
        let connection = Connection::system().await?;
        Self::with_connection(connection).await
    }

    /// Build a client on an existing connection.
    pub async fn with_connection(connection: Connection) -> BusResult<Self> {
        let proxy = SnapperProxy::new(&connection).await?;
        debug!(service = SNAPPER_SERVICE, "Snapper proxy created");
        Ok(Self { connection, proxy })
    }

    /// Check whether snapperd is running or can be activated on this bus.
    pub async fn is_service_available(&self) -> BusResult<bool> {
        let dbus = zbus::fdo::DBusProxy::new(&self.connection).await?;
        let name = zbus::names::BusName::try_from(SNAPPER_SERVICE)
            .map_err(|e| BusError::protocol(e.to_string()))?;

        if dbus.name_has_owner(name).await? {
            return Ok(true);
        }

        let activatable = dbus.list_activatable_names().await?;
        Ok(activatable.iter().any(|n| n.as_str() == SNAPPER_SERVICE))
    }

    /// Check whether the `snapper` tool used by [`SnapperBus::undo`] can be executed.
    pub async fn is_undo_available() -> bool {
        command_succeeds(SNAPPER_COMMAND, &["--version"]).await
    }
}

/// Run `program` and report whether it exited successfully.
async fn command_succeeds(program: &str, args: &[&str]) -> bool {
    match Command::new(program).args(args).output().await {
        Ok(output) => output.status.success(),
        Err(e) => {
            debug!(program, error = %e, "Command not runnable");
            false
        }
    }
}

#[async_trait]
impl SnapperBus for DbusSnapper {
    async fn list_snapshots(&self, config: &str) -> BusResult<Vec<RawSnapshot>> {
        debug!(config, "ListSnapshots");
        let snapshots = self.proxy.list_snapshots(config).await?;
        Ok(snapshots.into_iter().map(snapshot_from_tuple).collect())
    }

    async fn get_snapshot(&self, config: &str, number: u32) -> BusResult<RawSnapshot> {
        debug!(config, number, "GetSnapshot");
        Ok(snapshot_from_tuple(
            self.proxy.get_snapshot(config, number).await?,
        ))
    }

    async fn list_configs(&self) -> BusResult<Vec<ConfigInfo>> {
        debug!("ListConfigs");
        let configs = self.proxy.list_configs().await?;
        Ok(configs.into_iter().map(config_from_tuple).collect())
    }

    async fn get_config(&self, name: &str) -> BusResult<ConfigInfo> {
        debug!(config = name, "GetConfig");
        Ok(config_from_tuple(self.proxy.get_config(name).await?))
    }

    async fn set_config(&self, name: &str, settings: &HashMap<String, String>) -> BusResult<()> {
        debug!(config = name, keys = settings.len(), "SetConfig");
        Ok(self.proxy.set_config(name, settings).await?)
    }

    async fn create_single_snapshot(
        &self,
        config: &str,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> BusResult<u32> {
        debug!(config, description, cleanup, "CreateSingleSnapshot");
        Ok(self
            .proxy
            .create_single_snapshot(config, description, cleanup, userdata)
            .await?)
    }

    async fn create_pre_snapshot(
        &self,
        config: &str,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> BusResult<u32> {
        debug!(config, description, cleanup, "CreatePreSnapshot");
        Ok(self
            .proxy
            .create_pre_snapshot(config, description, cleanup, userdata)
            .await?)
    }

    async fn create_post_snapshot(
        &self,
        config: &str,
        pre_number: u32,
        description: &str,
        cleanup: &str,
        userdata: &HashMap<String, String>,
    ) -> BusResult<u32> {
        debug!(config, pre_number, description, cleanup, "CreatePostSnapshot");
        Ok(self
            .proxy
            .create_post_snapshot(config, pre_number, description, cleanup, userdata)
            .await?)
    }

    async fn delete_snapshots(&self, config: &str, numbers: &[u32]) -> BusResult<()> {
        debug!(config, ?numbers, "DeleteSnapshots");
        Ok(self.proxy.delete_snapshots(config, numbers).await?)
    }

    async fn create_comparison(&self, config: &str, pre: u32, post: u32) -> BusResult<()> {
        debug!(config, pre, post, "CreateComparison");
        Ok(self.proxy.create_comparison(config, pre, post).await?)
    }

    async fn get_files(&self, config: &str, pre: u32, post: u32) -> BusResult<Vec<ChangedFile>> {
        debug!(config, pre, post, "GetFiles");
        let files = self.proxy.get_files(config, pre, post).await?;
        Ok(files
            .into_iter()
            .map(|(path, status)| ChangedFile { path, status })
            .collect())
    }

    async fn mount_snapshot(
        &self,
        config: &str,
        number: u32,
        user_request: bool,
    ) -> BusResult<String> {
        debug!(config, number, user_request, "MountSnapshot");
        Ok(self
            .proxy
            .mount_snapshot(config, number, user_request)
            .await?)
    }

    async fn umount_snapshot(
        &self,
        config: &str,
        number: u32,
        user_request: bool,
    ) -> BusResult<()> {
        debug!(config, number, user_request, "UmountSnapshot");
        Ok(self
            .proxy
            .umount_snapshot(config, number, user_request)
            .await?)
    }

    /// snapperd has no undo method; reverting is done client-side by the
    /// `snapper` tool, which reports a `create:N modify:N delete:N` summary.
    async fn undo(
        &self,
        config: &str,
        pre: u32,
        post: u32,
        files: &[String],
    ) -> BusResult<UndoSummary> {
        let output = Command::new(SNAPPER_COMMAND)
            .args(["-c", config, "undochange"])
            .arg(format!("{pre}..{post}"))
            .args(files)
            .output()
            .await
            .map_err(|e| BusError::command(format!("failed to run {SNAPPER_COMMAND}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BusError::command(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let summary = UndoSummary::parse(&stdout)
            .ok_or_else(|| BusError::protocol(format!("unrecognized undo output: {stdout}")))?;

        info!(config, pre, post, files = files.len(), ?summary, "Undo completed");
        Ok(summary)
    }
}
