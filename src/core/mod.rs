//! Core logic for Tidemark.
//!
//! # Modules
//!
//! - [`state`] - Resume watermarks and the state manager
//! - [`watcher`] - Change-feed watcher state machine
//! - [`supervisor`] - Leadership-gated supervision of watchers
//!
//! # Flow
//!
//! 1. **Elect**: the supervisor is told this process leads
//! 2. **Open**: each watcher reads its watermark and subscribes after it
//! 3. **Deliver**: events reach the change handler one at a time
//! 4. **Checkpoint**: the watermark moves to the event after the handler succeeds
//! 5. **Restart**: a closed subscription is reopened from the latest watermark
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tidemark::adapters::cluster::StaticLeadership;
//! use tidemark::adapters::memory::{InMemoryChangeFeed, InMemoryWatermarkStore, ManualConnection};
//! use tidemark::core::state::StateManager;
//! use tidemark::core::supervisor::Supervisor;
//! use tidemark::core::watcher::{ChangeFeedWatcher, WatcherConfig};
//! use tidemark::domain::CollectionName;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connection = Arc::new(ManualConnection::new());
//! let state = StateManager::new_with_store(Arc::new(InMemoryWatermarkStore::new()));
//! let watcher = ChangeFeedWatcher::new(
//!     WatcherConfig::new(CollectionName::new("orders")?),
//!     Arc::new(InMemoryChangeFeed::new()),
//!     connection.clone(),
//!     state,
//! );
//!
//! let supervisor = Supervisor::new(vec![watcher], Arc::new(StaticLeadership::new()), connection);
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! supervisor.run(shutdown_rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod state;
pub mod supervisor;
pub mod watcher;
