// Tidemark - Resumable change feed consumer
// Copyright (c) 2025 Tidemark Contributors
// Licensed under the MIT License

//! # Tidemark - resumable change feed consumer
//!
//! Tidemark watches the change feeds of a set of collections and hands every
//! change to a handler, at least once and in order. After each handled event
//! it stores the event's position as a resume watermark, so a restarted
//! watcher continues after the last handled event instead of at the tail.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Watermark state, watchers and the leadership supervisor
//! - [`adapters`] - Ports and their PostgreSQL and in-memory implementations
//! - [`handlers`] - Built-in change handlers (log, webhook)
//! - [`domain`] - Identifiers, change events and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Watching a collection
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tidemark::adapters::memory::{InMemoryChangeFeed, InMemoryWatermarkStore, ManualConnection};
//! use tidemark::core::state::StateManager;
//! use tidemark::core::watcher::{ChangeFeedWatcher, WatchHandlers, WatcherConfig};
//! use tidemark::domain::CollectionName;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handlers = WatchHandlers::new().on_change(|event| async move {
//!     println!("{} {}", event.operation, event.payload);
//!     Ok(())
//! });
//!
//! let watcher = ChangeFeedWatcher::new(
//!     WatcherConfig::new(CollectionName::new("orders")?).with_handlers(handlers),
//!     Arc::new(InMemoryChangeFeed::new()),
//!     Arc::new(ManualConnection::new()),
//!     StateManager::new_with_store(Arc::new(InMemoryWatermarkStore::new())),
//! );
//!
//! watcher.start().await?;
//! // ...
//! watcher.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Leadership
//!
//! With several processes watching the same collections, the
//! [`core::supervisor::Supervisor`] runs the watchers only in the process
//! currently holding the lease, and stops them whenever that process loses
//! leadership or its database connection.
//!
//! ## Error Handling
//!
//! Library operations return [`domain::TidemarkError`]; change handlers return
//! `anyhow::Result` so they can fail with any error.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod handlers;
pub mod logging;
