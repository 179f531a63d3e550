//! Operations wrapped in a pre/post snapshot pair.

use crate::{SnapshotError, SnapshotModule, SnapshotRequest, SnapshotResult, DEFAULT_CLEANUP};
use serde_json::Value;
use snapctl_util::{job_id, TimingGuard};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Config used when a run does not name one.
pub const DEFAULT_CONFIG: &str = "root";

/// Wrapped operations running longer than this are logged at `info`.
const OPERATION_SLOW_AFTER: Duration = Duration::from_secs(10);

/// A wrapped run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub config: String,
    /// Registered operation name, e.g. `cmd.run`.
    pub operation: String,
    pub args: Value,
    /// Defaults to `snapctl run[<operation>]`.
    pub description: Option<String>,
    pub cleanup_algorithm: String,
    pub userdata: HashMap<String, String>,
    /// Tag stored on both snapshots.
    pub job_id: String,
}

impl RunRequest {
    /// Create a run of `operation` with a fresh job id.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            config: DEFAULT_CONFIG.to_string(),
            operation: operation.into(),
            args: Value::Null,
            description: None,
            cleanup_algorithm: DEFAULT_CLEANUP.to_string(),
            userdata: HashMap::new(),
            job_id: job_id(),
        }
    }

    /// Run against another config.
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    /// Set the arguments handed to the operation.
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Set the description of both snapshots.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the cleanup algorithm of both snapshots.
    pub fn with_cleanup(mut self, cleanup: impl Into<String>) -> Self {
        self.cleanup_algorithm = cleanup.into();
        self
    }

    /// Set extra userdata stored on both snapshots.
    pub fn with_userdata(mut self, userdata: HashMap<String, String>) -> Self {
        self.userdata = userdata;
        self
    }

    /// Use a caller-supplied job id instead of a generated one.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    fn snapshot_request(&self, request: SnapshotRequest) -> SnapshotRequest {
        let description = self
            .description
            .clone()
            .unwrap_or_else(|| format!("snapctl run[{}]", self.operation));

        request
            .with_description(description)
            .with_cleanup(self.cleanup_algorithm.clone())
            .with_userdata(self.userdata.clone())
            .with_job_id(self.job_id.clone())
    }
}

impl SnapshotModule {
    /// Run an operation between a pre and a post snapshot.
    ///
    /// Both snapshots carry the run's job id. If the operation fails no post
    /// snapshot is created and the error is returned.
    pub async fn run(&self, request: &RunRequest) -> SnapshotResult<Value> {
        let operation = self.operations.get(&request.operation).cloned().ok_or_else(|| {
            SnapshotError::invalid_argument(format!(
                "Function {} does not exist",
                request.operation
            ))
        })?;

        let pre = self
            .create_snapshot(&request.config, &request.snapshot_request(SnapshotRequest::pre()))
            .await?;

        let result = {
            let _timing = TimingGuard::operation(&request.operation)
                .with_slow_after(OPERATION_SLOW_AFTER);
            operation.execute(request.args.clone()).await
        };
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    config = %request.config,
                    operation = %request.operation,
                    job_id = %request.job_id,
                    pre,
                    error = %e,
                    "Wrapped operation failed, no post snapshot created"
                );
                return Err(e);
            }
        };

        let post = self
            .create_snapshot(
                &request.config,
                &request.snapshot_request(SnapshotRequest::post(pre)),
            )
            .await?;

        info!(
            config = %request.config,
            operation = %request.operation,
            job_id = %request.job_id,
            pre,
            post,
            "Wrapped run finished"
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Operation, OperationRegistry, SniffProbe, JOB_ID_KEY};
    use async_trait::async_trait;
    use serde_json::json;
    use snapctl_test_utils::{BusCall, MockSnapper};
    use std::sync::Arc;

    struct FailingOperation;

    #[async_trait]
    impl Operation for FailingOperation {
        fn name(&self) -> &str {
            "pkg.install"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn execute(&self, _args: Value) -> SnapshotResult<Value> {
            Err(SnapshotError::operation("pkg.install", "package not found"))
        }
    }

    fn module(bus: &MockSnapper) -> SnapshotModule {
        let mut operations = OperationRegistry::with_builtins();
        operations.register(Arc::new(FailingOperation));
        SnapshotModule::new(Arc::new(bus.clone()), Arc::new(SniffProbe)).with_operations(operations)
    }

    #[tokio::test]
    async fn test_run_creates_tagged_pair() {
        let bus = MockSnapper::new().with_snapshots("root", Vec::new());
        let module = module(&bus);

        let request = RunRequest::new("test.ping").with_job_id("job_20160304");
        let value = module.run(&request).await.unwrap();
        assert_eq!(value, json!(true));

        let calls = bus.calls();
        assert_eq!(calls.len(), 2);
        let BusCall::CreatePreSnapshot { description, userdata, .. } = &calls[0] else {
            panic!("expected a pre snapshot first, got {:?}", calls[0]);
        };
        assert_eq!(description, "snapctl run[test.ping]");
        assert_eq!(userdata[JOB_ID_KEY], "job_20160304");

        let BusCall::CreatePostSnapshot { pre_number, userdata, .. } = &calls[1] else {
            panic!("expected a post snapshot second, got {:?}", calls[1]);
        };
        assert_eq!(userdata[JOB_ID_KEY], "job_20160304");

        let snapshots = module.list_snapshots("root").await.unwrap();
        assert_eq!(snapshots[1].pre, Some(*pre_number));
        assert_eq!(snapshots[0].job_id(), snapshots[1].job_id());
    }

    #[tokio::test]
    async fn test_run_returns_operation_value() {
        let bus = MockSnapper::new().with_snapshots("home", Vec::new());
        let request = RunRequest::new("cmd.run")
            .with_config("home")
            .with_args(json!("printf 'hello\\n'"))
            .with_description("say hello");

        let value = module(&bus).run(&request).await.unwrap();
        assert_eq!(value, json!("hello"));
        assert!(bus.calls().iter().all(|c| c.config() == Some("home")));
    }

    #[tokio::test]
    async fn test_failed_operation_has_no_post_snapshot() {
        let bus = MockSnapper::new().with_snapshots("root", Vec::new());

        let err = module(&bus)
            .run(&RunRequest::new("pkg.install"))
            .await
            .unwrap_err();

        assert!(matches!(err, SnapshotError::Operation { .. }));
        let calls = bus.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], BusCall::CreatePreSnapshot { .. }));
    }

    #[tokio::test]
    async fn test_unknown_operation_creates_nothing() {
        let bus = MockSnapper::new().with_snapshots("root", Vec::new());

        let err = module(&bus)
            .run(&RunRequest::new("pkg.nope"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid argument: Function pkg.nope does not exist");
        assert!(bus.calls().is_empty());
    }

    #[test]
    fn test_default_job_id() {
        let request = RunRequest::new("test.ping");
        assert!(request.job_id.starts_with("job_"));
        assert_eq!(request.config, "root");
        assert_eq!(request.cleanup_algorithm, "number");
    }
}
