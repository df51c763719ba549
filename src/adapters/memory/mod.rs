//! In-memory adapters
//!
//! Process-local implementations of every port. They back the test suite
//! and allow embedding the watcher without external infrastructure.

pub mod cluster;
pub mod feed;
pub mod store;

pub use cluster::{ManualConnection, ManualLeadership};
pub use feed::InMemoryChangeFeed;
pub use store::InMemoryWatermarkStore;
