//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Tidemark configuration file.

use crate::cli::{EXIT_CONFIG, EXIT_OK};
use crate::config::{load_config, redacted_connection_string, HandlerKind};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading already validates; a file that loads is valid.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Application: {}", config.application.name);
        println!("  Log Level: {}", config.application.log_level);
        println!(
            "  PostgreSQL: {}",
            redacted_connection_string(&config.postgresql.connection_string)
        );
        println!("  Max Connections: {}", config.postgresql.max_connections);
        println!("  Collections: {:?}", config.feed.collections);
        println!("  Events Table: {}", config.feed.events_table);
        println!("  Resume Token Table: {}", config.feed.resume_token_table);
        println!("  Poll Interval: {}ms", config.feed.poll_interval_ms);
        if config.leadership.enabled {
            println!(
                "  Leadership: group '{}', ttl {}ms, wait {}ms",
                config.leadership.group, config.leadership.ttl_ms, config.leadership.wait_ms
            );
        } else {
            println!("  Leadership: disabled (sole leader)");
        }
        match config.handler.kind {
            HandlerKind::Log => println!("  Handler: log"),
            HandlerKind::Webhook => println!(
                "  Handler: webhook -> {}",
                config.handler.url.as_deref().unwrap_or_default()
            ),
        }
        println!();
        Ok(EXIT_OK)
    }
}
