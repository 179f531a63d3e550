//! Shared utilities for snapctl.
//!
//! - Job ids tagging wrapped runs
//! - Logging setup with tracing
//! - Path helpers for mounted snapshots and ignore lists
//! - Duration logging for long workflows

pub mod id;
pub mod log;
pub mod path;
pub mod timing;

pub use id::job_id;
pub use timing::TimingGuard;
