//! Reset command implementation
//!
//! Deletes a collection's resume watermark. The next run opens that
//! collection at the tail of its feed, skipping anything not yet handled.

use crate::adapters::database::{create_client, create_watermark_store};
use crate::cli::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_OK};
use crate::config::load_config;
use crate::core::state::StateManager;
use crate::domain::ids::CollectionName;
use clap::Args;

/// Arguments for the reset command
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Collection whose watermark is deleted
    pub collection: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl ResetArgs {
    /// Execute the reset command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let collection = match CollectionName::new(self.collection.clone()) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Invalid collection name: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if !self.yes {
            println!("This deletes the resume watermark of '{collection}'.");
            println!("Events not yet handled will be skipped on the next run.");
            print!("Proceed? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Reset cancelled.");
                return Ok(EXIT_OK);
            }
        }

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
        let result = state_manager.reset(&collection).await;
        client.close();

        match result {
            Ok(true) => {
                println!("✅ Watermark for '{collection}' deleted");
                Ok(EXIT_OK)
            }
            Ok(false) => {
                println!("No watermark stored for '{collection}'; nothing to do");
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("❌ Failed to delete watermark");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }
}
