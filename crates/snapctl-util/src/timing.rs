//! Duration logging for long-running workflows.
//!
//! ```rust,ignore
//! let _timing = TimingGuard::snapshot("diff");
//! // mount, compare, unmount; the duration is logged when the guard drops
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Workflows slower than this are logged at `info`.
const DEFAULT_SLOW_AFTER: Duration = Duration::from_secs(1);

/// Logs how long a workflow took when dropped.
pub struct TimingGuard {
    kind: &'static str,
    name: String,
    started: Instant,
    slow_after: Duration,
}

impl TimingGuard {
    /// Start timing a workflow of the given kind.
    pub fn new(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            started: Instant::now(),
            slow_after: DEFAULT_SLOW_AFTER,
        }
    }

    /// A diff, status, undo or baseline workflow.
    pub fn snapshot(name: impl Into<String>) -> Self {
        Self::new("snapshot", name)
    }

    /// An operation wrapped between a pre and a post snapshot.
    pub fn operation(name: impl Into<String>) -> Self {
        Self::new("operation", name)
    }

    /// Set the duration above which the finish is logged at `info`.
    pub fn with_slow_after(mut self, slow_after: Duration) -> Self {
        self.slow_after = slow_after;
        self
    }

    /// Time since the guard was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the workflow has run past its slow threshold.
    pub fn is_slow(&self) -> bool {
        self.elapsed() >= self.slow_after
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed().as_millis() as u64;
        if self.is_slow() {
            info!(kind = self.kind, name = %self.name, elapsed_ms, "Finished slow {}", self.kind);
        } else {
            debug!(kind = self.kind, name = %self.name, elapsed_ms, "Finished {}", self.kind);
        }
    }
}
