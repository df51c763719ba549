//! PostgreSQL integration
//!
//! - [`client`] - Pooled client shared by everything below
//! - [`schema`] - Table layout
//! - [`store`] - Resume watermark store
//! - [`feed`] - Change feed over an events table
//! - [`monitor`] - Connection liveness
//! - [`lease`] - Leader election lease

pub mod client;
pub mod feed;
pub mod lease;
pub mod models;
pub mod monitor;
pub mod schema;
pub mod store;

pub use client::PostgreSQLClient;
pub use feed::PostgreSQLChangeFeed;
pub use lease::{LeaseOptions, PostgreSQLLeaderLease};
pub use models::{PostgreSQLChangeEvent, PostgreSQLResumeToken};
pub use monitor::PostgreSQLConnection;
pub use schema::TableNames;
pub use store::PostgreSQLWatermarkStore;
