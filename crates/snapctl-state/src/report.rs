//! Convergence reports.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of applying a state.
///
/// `result` is `None` when running in test mode and changes would be made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateReport {
    pub name: String,
    pub result: Option<bool>,
    pub comment: String,
    pub changes: Map<String, Value>,
}

impl StateReport {
    /// A successful report with no changes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: Some(true),
            comment: String::new(),
            changes: Map::new(),
        }
    }

    /// Mark the state as failed.
    pub fn failed(mut self, comment: impl ToString) -> Self {
        self.result = Some(false);
        self.comment = comment.to_string();
        self
    }

    /// Mark changes as pending, for test mode.
    pub fn pending(mut self, comment: impl Into<String>) -> Self {
        self.result = None;
        self.comment = comment.into();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Record a change under `key`.
    pub fn with_change(mut self, key: impl Into<String>, value: Value) -> Self {
        self.changes.insert(key.into(), value);
        self
    }
}
