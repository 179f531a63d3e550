//! Snapper config settings.
//!
//! The daemon stores every tunable as a string keyed by an upper-case name.
//! [`SnapperSettings`] gives the well-known keys types and keeps anything
//! else in `extra`, so listing a config never hides a key.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A config as returned by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapperConfig {
    pub name: String,
    pub subvolume: String,
    pub settings: SnapperSettings,
}

/// Typed view of a config's settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapperSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subvolume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fstype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qgroup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_limit: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_users: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_acl: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_comparison: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_cleanup: Option<bool>,
    /// A count or a `min-max` range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_limit_important: Option<String>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_min_age: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_create: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_cleanup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_min_age: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_limit_hourly: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_limit_daily: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_limit_weekly: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_limit_monthly: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_limit_yearly: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_pre_post_cleanup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_pre_post_min_age: Option<u64>,
    /// Keys this version does not know about, verbatim.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Pulls typed values out of a raw settings map, leaving unparsable values behind.
struct Fields(BTreeMap<String, String>);

impl Fields {
    fn string(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    fn list(&mut self, key: &str) -> Vec<String> {
        self.0
            .remove(key)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn flag(&mut self, key: &str) -> Option<bool> {
        let value = parse_flag(self.0.get(key)?)?;
        self.0.remove(key);
        Some(value)
    }

    fn number(&mut self, key: &str) -> Option<u64> {
        let value = self.0.get(key)?.trim().parse().ok()?;
        self.0.remove(key);
        Some(value)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn flag_str(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

impl SnapperSettings {
    /// Build the typed view from the daemon's raw map.
    pub fn from_map(settings: &HashMap<String, String>) -> Self {
        let mut f = Fields(
            settings
                .iter()
                .map(|(k, v)| (k.to_ascii_uppercase(), v.clone()))
                .collect(),
        );

        Self {
            subvolume: f.string("SUBVOLUME"),
            fstype: f.string("FSTYPE"),
            qgroup: f.string("QGROUP"),
            space_limit: f.string("SPACE_LIMIT"),
            free_limit: f.string("FREE_LIMIT"),
            allow_users: f.list("ALLOW_USERS"),
            allow_groups: f.list("ALLOW_GROUPS"),
            sync_acl: f.flag("SYNC_ACL"),
            background_comparison: f.flag("BACKGROUND_COMPARISON"),
            number_cleanup: f.flag("NUMBER_CLEANUP"),
            number_limit: f.string("NUMBER_LIMIT"),
            number_limit_important: f.string("NUMBER_LIMIT_IMPORTANT"),
            number_min_age: f.number("NUMBER_MIN_AGE"),
            timeline_create: f.flag("TIMELINE_CREATE"),
            timeline_cleanup: f.flag("TIMELINE_CLEANUP"),
            timeline_min_age: f.number("TIMELINE_MIN_AGE"),
            timeline_limit_hourly: f.string("TIMELINE_LIMIT_HOURLY"),
            timeline_limit_daily: f.string("TIMELINE_LIMIT_DAILY"),
            timeline_limit_weekly: f.string("TIMELINE_LIMIT_WEEKLY"),
            timeline_limit_monthly: f.string("TIMELINE_LIMIT_MONTHLY"),
            timeline_limit_yearly: f.string("TIMELINE_LIMIT_YEARLY"),
            empty_pre_post_cleanup: f.flag("EMPTY_PRE_POST_CLEANUP"),
            empty_pre_post_min_age: f.number("EMPTY_PRE_POST_MIN_AGE"),
            extra: f.0,
        }
    }
}

/// A value written with `set_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl ConfigValue {
    /// Parse a command-line value: `true`/`yes`, `false`/`no`, an integer, or text.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" => Self::Bool(true),
            "false" | "no" => Self::Bool(false),
            _ => value
                .parse()
                .map(Self::Int)
                .unwrap_or_else(|_| Self::Text(value.to_string())),
        }
    }

    /// Render the value the way the daemon stores it.
    pub fn to_daemon_string(&self) -> String {
        match self {
            Self::Bool(b) => flag_str(*b),
            Self::Int(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A set of config changes. Keys are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfigUpdate(BTreeMap<String, ConfigValue>);

impl ConfigUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, replacing any earlier value for the same key.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a value in place. The key is stored upper-cased.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into().to_ascii_uppercase(), value.into());
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render for the daemon, booleans as `yes`/`no`.
    pub fn normalize(&self) -> HashMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_daemon_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapctl_test_utils::fixtures;

    #[test]
    fn test_normalize_keys_and_booleans() {
        let update = ConfigUpdate::new()
            .set("sync_acl", true)
            .set("foo", false)
            .set("bar", 12i64);

        let normalized = update.normalize();
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized["SYNC_ACL"], "yes");
        assert_eq!(normalized["FOO"], "no");
        assert_eq!(normalized["BAR"], "12");
    }

    #[test]
    fn test_keys_differing_in_case_collapse() {
        let update = ConfigUpdate::new()
            .set("sync_acl", true)
            .set("SYNC_ACL", false)
            .set("Number_Limit", "4-10");

        assert_eq!(update.len(), 2);
        let normalized = update.normalize();
        assert_eq!(normalized["SYNC_ACL"], "no");
        assert_eq!(normalized["NUMBER_LIMIT"], "4-10");
    }

    #[test]
    fn test_parse_cli_values() {
        assert_eq!(ConfigValue::parse("true"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::parse("False"), ConfigValue::Bool(false));
        assert_eq!(ConfigValue::parse("yes"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::parse("NO"), ConfigValue::Bool(false));
        assert_eq!(ConfigValue::parse("1"), ConfigValue::Int(1));
        assert_eq!(ConfigValue::parse("1234"), ConfigValue::Int(1234));
        assert_eq!(ConfigValue::parse("4-10"), ConfigValue::Text("4-10".into()));
    }

    #[test]
    fn test_settings_from_daemon_map() {
        let settings = SnapperSettings::from_map(&fixtures::root_config().settings);
        assert_eq!(settings.subvolume.as_deref(), Some("/"));
        assert_eq!(settings.fstype.as_deref(), Some("btrfs"));
        assert_eq!(settings.sync_acl, Some(false));
        assert_eq!(settings.background_comparison, Some(true));
        assert_eq!(settings.number_min_age, Some(1800));
        assert_eq!(settings.number_limit.as_deref(), Some("10"));
        assert_eq!(settings.timeline_limit_yearly.as_deref(), Some("4-10"));
        assert!(settings.allow_users.is_empty());
        assert!(settings.extra.is_empty());
    }

    #[test]
    fn test_unknown_and_malformed_keys_are_kept() {
        let mut raw = HashMap::new();
        raw.insert("SYNC_ACL".to_string(), "maybe".to_string());
        raw.insert("FUTURE_KNOB".to_string(), "7".to_string());

        let settings = SnapperSettings::from_map(&raw);
        assert_eq!(settings.sync_acl, None);
        assert_eq!(settings.extra["SYNC_ACL"], "maybe");
        assert_eq!(settings.extra["FUTURE_KNOB"], "7");
    }
}
