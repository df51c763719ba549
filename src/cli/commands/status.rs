//! Status command implementation
//!
//! Prints the stored resume watermark of every collection.

use crate::adapters::database::{create_client, create_watermark_store};
use crate::cli::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_OK};
use crate::config::load_config;
use crate::core::state::{ResumeWatermark, StateManager};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this collection
    #[arg(long)]
    pub collection: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking watermark status");

        println!("📊 Watermark Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let client = match create_client(&config) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Invalid database configuration");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        if let Err(e) = client.test_connection().await {
            println!("❌ Failed to connect to database");
            println!("   Error: {e}");
            return Ok(EXIT_CONNECTION);
        }

        let state_manager =
            StateManager::new_with_store(create_watermark_store(&config, client.clone()));

        let watermarks = match state_manager.get_all_watermarks().await {
            Ok(w) => w,
            Err(e) => {
                println!("❌ Failed to load watermarks");
                println!("   Error: {e}");
                client.close();
                return Ok(EXIT_FATAL);
            }
        };
        client.close();

        let filtered = self.filter(watermarks);
        if filtered.is_empty() {
            match &self.collection {
                Some(name) => println!("No watermark stored for '{name}'."),
                None => {
                    println!("No watermarks stored yet.");
                    println!("Run 'tidemark run' to start consuming changes.");
                }
            }
            return Ok(EXIT_OK);
        }

        println!("Found {} watermark(s):", filtered.len());
        println!();
        println!("{:<30} {:<30} {:<25}", "Collection", "Resume Token", "Updated");
        println!("{}", "-".repeat(85));
        for watermark in &filtered {
            println!(
                "{:<30} {:<30} {:<25}",
                watermark.collection_name.as_str(),
                watermark.token.to_string(),
                watermark.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        let configured: Vec<&String> = config
            .feed
            .collections
            .iter()
            .filter(|name| {
                !filtered
                    .iter()
                    .any(|w| w.collection_name.as_str() == name.as_str())
            })
            .filter(|name| self.collection.as_ref().map_or(true, |c| c == *name))
            .collect();
        if !configured.is_empty() {
            println!();
            for name in configured {
                println!("⏸️  {name}: no watermark, will start from the tail");
            }
        }

        println!();
        Ok(EXIT_OK)
    }

    fn filter(&self, watermarks: Vec<ResumeWatermark>) -> Vec<ResumeWatermark> {
        watermarks
            .into_iter()
            .filter(|w| {
                self.collection
                    .as_deref()
                    .map_or(true, |name| w.collection_name.as_str() == name)
            })
            .collect()
    }
}
