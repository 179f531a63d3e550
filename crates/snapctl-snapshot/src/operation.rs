//! Operations that can be wrapped in a pre/post snapshot pair.

use crate::{SnapshotError, SnapshotResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::process::Command;

/// A state-changing operation.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Name the operation is invoked by, e.g. `cmd.run`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Run the operation. The returned value is handed back to the caller as-is.
    async fn execute(&self, args: Value) -> SnapshotResult<Value>;
}

/// A boxed operation for dynamic dispatch.
pub type BoxedOperation = Arc<dyn Operation>;

/// Registry of operations available to wrapped runs.
pub struct OperationRegistry {
    operations: HashMap<String, BoxedOperation>,
}

impl OperationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Create a registry with the built-in operations.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PingOperation));
        registry.register(Arc::new(CommandOperation));
        registry
    }

    /// Add an operation, replacing any operation with the same name.
    pub fn register(&mut self, operation: BoxedOperation) {
        self.operations
            .insert(operation.name().to_string(), operation);
    }

    /// Look up an operation by name.
    pub fn get(&self, name: &str) -> Option<&BoxedOperation> {
        self.operations.get(name)
    }

    /// Operation names with their descriptions.
    pub fn descriptions(&self) -> BTreeMap<&str, &str> {
        self.operations
            .iter()
            .map(|(name, operation)| (name.as_str(), operation.description()))
            .collect()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// `test.ping`: always returns `true`.
pub struct PingOperation;

#[async_trait]
impl Operation for PingOperation {
    fn name(&self) -> &str {
        "test.ping"
    }

    fn description(&self) -> &str {
        "Return true. Useful to check the wrapping itself."
    }

    async fn execute(&self, _args: Value) -> SnapshotResult<Value> {
        Ok(Value::Bool(true))
    }
}

/// `cmd.run`: run a shell command and return its stdout.
///
/// Arguments are either a bare string or `{"cmd": "...", "cwd": "..."}`.
pub struct CommandOperation;

#[async_trait]
impl Operation for CommandOperation {
    fn name(&self) -> &str {
        "cmd.run"
    }

    fn description(&self) -> &str {
        "Run a shell command and return its standard output."
    }

    async fn execute(&self, args: Value) -> SnapshotResult<Value> {
        let (cmd, cwd) = match &args {
            Value::String(cmd) => (cmd.as_str(), None),
            Value::Object(map) => (
                map.get("cmd").and_then(Value::as_str).ok_or_else(|| {
                    SnapshotError::invalid_argument("cmd.run requires a 'cmd' string")
                })?,
                map.get("cwd").and_then(Value::as_str),
            ),
            _ => {
                return Err(SnapshotError::invalid_argument(
                    "cmd.run expects a command string or an object with 'cmd'",
                ))
            }
        };

        let mut command = Command::new("sh");
        command.arg("-c").arg(cmd);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let output = command.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SnapshotError::operation(
                self.name(),
                format!("{} ({})", stderr.trim(), output.status),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Value::String(stdout.trim_end_matches('\n').to_string()))
    }
}
