//! Snapshot data structures.

use crate::{SnapshotError, SnapshotResult};
use chrono::{DateTime, Utc};
use nix::unistd::{Uid, User};
use serde::{Deserialize, Serialize};
use snapctl_bus::{RawSnapshot, UNSET_TIMESTAMP};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Userdata key under which the triggering job's identifier is stored.
pub const JOB_ID_KEY: &str = "job_id";

/// Userdata key marking a snapshot as a named baseline.
pub const BASELINE_TAG_KEY: &str = "baseline_tag";

/// Cleanup algorithm used when the caller does not pick one.
pub const DEFAULT_CLEANUP: &str = "number";

/// Kind of a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    #[default]
    Single,
    Pre,
    Post,
}

impl SnapshotKind {
    /// Decode the daemon's type code.
    pub fn from_code(code: u16) -> SnapshotResult<Self> {
        match code {
            0 => Ok(Self::Single),
            1 => Ok(Self::Pre),
            2 => Ok(Self::Post),
            other => Err(SnapshotError::invalid_argument(format!(
                "unknown snapshot type code {other}"
            ))),
        }
    }

    /// Name used by the daemon and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl FromStr for SnapshotKind {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            other => Err(SnapshotError::invalid_argument(format!(
                "Invalid snapshot type '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot as presented to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Daemon-assigned number, unique within a config.
    pub id: u32,

    #[serde(rename = "type")]
    pub kind: SnapshotKind,

    /// Number of the matching pre snapshot. Only present when non-zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre: Option<u32>,

    pub timestamp: DateTime<Utc>,

    /// Name of the user that created the snapshot.
    pub user: String,

    pub description: String,

    /// Cleanup algorithm tag. Not interpreted here.
    pub cleanup: String,

    #[serde(default)]
    pub userdata: BTreeMap<String, String>,
}

impl SnapshotRecord {
    /// Map a daemon tuple, resolving the uid through the host passwd database.
    pub fn from_raw(raw: RawSnapshot) -> SnapshotResult<Self> {
        Self::from_raw_with(raw, lookup_user)
    }

    /// Map a daemon tuple with a custom uid resolver.
    pub fn from_raw_with<F>(raw: RawSnapshot, resolve_user: F) -> SnapshotResult<Self>
    where
        F: FnOnce(u32) -> SnapshotResult<String>,
    {
        let kind = SnapshotKind::from_code(raw.kind)?;

        let timestamp = if raw.date == UNSET_TIMESTAMP {
            Utc::now()
        } else {
            DateTime::from_timestamp(raw.date, 0).ok_or_else(|| {
                SnapshotError::invalid_argument(format!(
                    "snapshot {} has an out-of-range date {}",
                    raw.number, raw.date
                ))
            })?
        };

        Ok(Self {
            id: raw.number,
            kind,
            pre: (raw.pre_number != 0).then_some(raw.pre_number),
            timestamp,
            user: resolve_user(raw.uid)?,
            description: raw.description,
            cleanup: raw.cleanup,
            userdata: raw.userdata.into_iter().collect(),
        })
    }

    /// Get the job identifier this snapshot was tagged with.
    pub fn job_id(&self) -> Option<&str> {
        self.userdata.get(JOB_ID_KEY).map(String::as_str)
    }

    /// Get the baseline tag of this snapshot.
    pub fn baseline_tag(&self) -> Option<&str> {
        self.userdata.get(BASELINE_TAG_KEY).map(String::as_str)
    }
}

/// Resolve a numeric uid to a user name.
pub fn lookup_user(uid: u32) -> SnapshotResult<String> {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => Ok(user.name),
        Ok(None) => Err(SnapshotError::invalid_argument(format!(
            "no user with uid {uid}"
        ))),
        Err(e) => Err(SnapshotError::Io(std::io::Error::from(e))),
    }
}

/// Parameters for creating a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub kind: SnapshotKind,
    /// Required for post snapshots.
    pub pre_number: Option<u32>,
    pub description: Option<String>,
    pub cleanup_algorithm: String,
    pub userdata: HashMap<String, String>,
    /// Job that triggered the snapshot; merged into userdata.
    pub job_id: Option<String>,
}

impl Default for SnapshotRequest {
    fn default() -> Self {
        Self {
            kind: SnapshotKind::Single,
            pre_number: None,
            description: None,
            cleanup_algorithm: DEFAULT_CLEANUP.to_string(),
            userdata: HashMap::new(),
            job_id: None,
        }
    }
}

impl SnapshotRequest {
    /// Request a standalone snapshot.
    pub fn single() -> Self {
        Self::default()
    }

    /// Request the first half of a pre/post pair.
    pub fn pre() -> Self {
        Self {
            kind: SnapshotKind::Pre,
            ..Self::default()
        }
    }

    /// Request the post snapshot closing the pair opened by `pre_number`.
    pub fn post(pre_number: u32) -> Self {
        Self {
            kind: SnapshotKind::Post,
            pre_number: Some(pre_number),
            ..Self::default()
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the cleanup algorithm.
    pub fn with_cleanup(mut self, cleanup: impl Into<String>) -> Self {
        self.cleanup_algorithm = cleanup.into();
        self
    }

    /// Set the userdata sent along with the snapshot.
    pub fn with_userdata(mut self, userdata: HashMap<String, String>) -> Self {
        self.userdata = userdata;
        self
    }

    /// Tag the snapshot with the job that triggered it.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Userdata as sent to the daemon, with the job id merged in.
    pub(crate) fn effective_userdata(&self) -> HashMap<String, String> {
        let mut userdata = self.userdata.clone();
        if let Some(job_id) = &self.job_id {
            userdata.insert(JOB_ID_KEY.to_string(), job_id.clone());
        }
        userdata
    }

    /// Description as sent to the daemon.
    pub(crate) fn effective_description(&self) -> String {
        match (&self.description, &self.job_id) {
            (Some(description), _) => description.clone(),
            (None, Some(job_id)) => format!("job {job_id}"),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapctl_test_utils::fixtures;

    fn root(_uid: u32) -> SnapshotResult<String> {
        Ok("root".to_string())
    }

    #[test]
    fn test_pre_snapshot_has_no_back_reference() {
        let record = SnapshotRecord::from_raw_with(fixtures::pre_snapshot(), root).unwrap();
        assert_eq!(record.id, 42);
        assert_eq!(record.kind, SnapshotKind::Pre);
        assert_eq!(record.pre, None);
        assert_eq!(record.user, "root");
        assert_eq!(record.timestamp.timestamp(), 1457006571);
        assert_eq!(record.description, "Some description");
        assert_eq!(record.cleanup, "");
        assert_eq!(record.userdata["userdata1"], "userval1");

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("pre").is_none());
        assert_eq!(json["type"], "pre");
    }

    #[test]
    fn test_post_snapshot_keeps_back_reference() {
        let record = SnapshotRecord::from_raw_with(fixtures::post_snapshot(), root).unwrap();
        assert_eq!(record.kind, SnapshotKind::Post);
        assert_eq!(record.pre, Some(42));
        assert_eq!(serde_json::to_value(&record).unwrap()["pre"], 42);
    }

    #[test]
    fn test_unset_timestamp_is_now() {
        let mut raw = fixtures::pre_snapshot();
        raw.date = UNSET_TIMESTAMP;
        let before = Utc::now();
        let record = SnapshotRecord::from_raw_with(raw, root).unwrap();
        let after = Utc::now();
        assert!(record.timestamp >= before && record.timestamp <= after);
    }

    #[test]
    fn test_uid_resolved_from_passwd() {
        let record = SnapshotRecord::from_raw(fixtures::pre_snapshot()).unwrap();
        assert_eq!(record.user, "root");
    }

    #[test]
    fn test_user_resolution_failure_is_error() {
        let result = SnapshotRecord::from_raw_with(fixtures::pre_snapshot(), |uid| {
            Err(SnapshotError::invalid_argument(format!("no user with uid {uid}")))
        });
        assert!(matches!(result, Err(SnapshotError::InvalidArgument(_))));
    }

    #[test]
    fn test_unknown_type_code() {
        let mut raw = fixtures::pre_snapshot();
        raw.kind = 7;
        assert!(SnapshotRecord::from_raw_with(raw, root).is_err());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("post".parse::<SnapshotKind>().unwrap(), SnapshotKind::Post);
        assert!("weekly".parse::<SnapshotKind>().is_err());
    }

    #[test]
    fn test_request_job_tagging() {
        let mut userdata = HashMap::new();
        userdata.insert("owner".to_string(), "ops".to_string());
        let request = SnapshotRequest::pre()
            .with_userdata(userdata)
            .with_job_id("job_1");

        let effective = request.effective_userdata();
        assert_eq!(effective[JOB_ID_KEY], "job_1");
        assert_eq!(effective["owner"], "ops");
        assert!(!request.userdata.contains_key(JOB_ID_KEY));
        assert_eq!(request.effective_description(), "job job_1");
        assert_eq!(
            request.with_description("upgrade").effective_description(),
            "upgrade"
        );
    }
}
