//! Declarative states built on the snapshot module.
//!
//! A state describes how the system should look and converges it, reporting
//! what it did (or, in test mode, would do) instead of failing.

mod report;
mod snapshot;

pub use report::StateReport;
pub use snapshot::{BaselineSnapshot, SnapshotState};
