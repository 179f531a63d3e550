//! Testing utilities, fixtures, and mocks for snapctl.
//!
//! - **Fixtures**: daemon tuples and configs as snapperd reports them
//! - **Mocks**: an in-memory snapper daemon that records every call
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use snapctl_test_utils::{fixtures, MockSnapper};
//!
//! #[tokio::test]
//! async fn test_listing() {
//!     let bus = MockSnapper::new().with_snapshots("root", fixtures::snapshots());
//!     let module = SnapshotModule::new(Arc::new(bus.clone()), Arc::new(SniffProbe));
//!
//!     assert_eq!(module.list_snapshots("root").await.unwrap().len(), 2);
//!     assert_eq!(bus.calls().len(), 1);
//! }
//! ```

pub mod fixtures;
pub mod mocks;

pub use mocks::{BusCall, MockSnapper};
