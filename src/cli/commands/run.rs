//! Run command implementation
//!
//! Builds one watcher per configured collection and hands them to the
//! supervisor, which starts them while this process leads and the database
//! is reachable. Returns once a shutdown signal has been handled.

use crate::adapters::database::create_backend;
use crate::cli::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_OK};
use crate::config::{load_config, redacted_connection_string, TidemarkConfig};
use crate::core::state::StateManager;
use crate::core::supervisor::Supervisor;
use crate::core::watcher::{ChangeFeedWatcher, RestartPolicy, WatchHandlers, WatcherConfig};
use crate::domain::ids::CollectionName;
use crate::handlers::{create_handler, ChangeHandler};
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the watched collections (comma-separated)
    #[arg(long)]
    pub collections: Option<String>,

    /// Run as sole leader without campaigning for the lease
    #[arg(long)]
    pub no_leader_election: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        self.apply_overrides(&mut config);
        if let Err(e) = config.validate() {
            println!("❌ Configuration validation failed");
            println!("   Error: {e}");
            return Ok(EXIT_CONFIG);
        }

        let collections = match config.collection_names() {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Invalid collection name: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let handler = match create_handler(&config.handler) {
            Ok(h) => h,
            Err(e) => {
                println!("❌ Failed to create change handler");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        tracing::info!(
            database = %redacted_connection_string(&config.postgresql.connection_string),
            collections = %config.feed.collections.join(","),
            handler = ?config.handler.kind,
            leader_election = config.leadership.enabled,
            "Connecting"
        );

        let backend = match create_backend(&config).await {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                println!("❌ Failed to connect to database");
                println!("   Error: {e}");
                return Ok(EXIT_CONNECTION);
            }
        };

        let state_manager = StateManager::new_with_store(backend.store.clone());
        let restart = RestartPolicy::from(&config.restart);
        let watchers = collections
            .into_iter()
            .map(|collection| {
                let watcher_config = WatcherConfig::new(collection.clone())
                    .with_watch_options(config.feed.watch.clone())
                    .with_restart_policy(restart.clone())
                    .with_handlers(build_handlers(collection, handler.clone()));
                ChangeFeedWatcher::new(
                    watcher_config,
                    backend.feed.clone(),
                    backend.connection.clone(),
                    state_manager.clone(),
                )
            })
            .collect();

        let supervisor = Supervisor::new(
            watchers,
            backend.leadership.clone(),
            backend.connection.clone(),
        )
        .with_recheck_on_reconnect(config.leadership.recheck_on_reconnect);

        println!(
            "👀 Watching {} collection(s); press Ctrl+C to stop",
            config.feed.collections.len()
        );

        match supervisor.run(shutdown_signal).await {
            Ok(()) => {
                for (collection, state) in supervisor.states() {
                    tracing::info!(collection = %collection, state = %state, "Watcher finished");
                }
                println!("✅ Shut down cleanly");
                Ok(EXIT_OK)
            }
            Err(e) => {
                tracing::error!(error = %e, "Supervisor failed during shutdown");
                println!("❌ Shutdown failed");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }

    fn apply_overrides(&self, config: &mut TidemarkConfig) {
        if let Some(collections) = &self.collections {
            tracing::info!(collections = %collections, "Overriding collections from CLI");
            config.feed.collections = collections
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if self.no_leader_election {
            tracing::info!("Leader election disabled from CLI");
            config.leadership.enabled = false;
        }
    }
}

/// Callbacks wiring a change handler into a watcher
fn build_handlers(collection: CollectionName, handler: Arc<dyn ChangeHandler>) -> WatchHandlers {
    let on_error_collection = collection.clone();
    WatchHandlers::new()
        .with_change_handler(handler)
        .on_error(move |err| {
            let collection = on_error_collection.clone();
            async move {
                tracing::warn!(collection = %collection, error = %err, "Change feed error");
            }
        })
        .on_end(move || {
            let collection = collection.clone();
            async move {
                tracing::warn!(collection = %collection, "Change feed invalidated");
            }
        })
}
