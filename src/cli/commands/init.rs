//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use crate::cli::{EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "tidemark.toml")]
    pub output: String,

    /// Include every optional setting with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Tidemark configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIG);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your collections", self.output);
                println!("  2. Set TIDEMARK_DATABASE_URL (or add it to .env)");
                println!("  3. Validate configuration: tidemark validate-config");
                println!("  4. Start watching: tidemark run");
                println!();
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# Tidemark Configuration File

[postgresql]
connection_string = "${TIDEMARK_DATABASE_URL}"

[feed]
collections = ["orders"]
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# Tidemark Configuration File
# Values of the form ${VAR} are read from the environment.
# Any key can also be overridden with TIDEMARK_<SECTION>_<KEY>.

[application]
name = "tidemark"
log_level = "info"  # trace | debug | info | warn | error

[postgresql]
connection_string = "${TIDEMARK_DATABASE_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60

[feed]
# One watcher per collection
collections = ["orders", "payments"]
events_table = "change_events"
resume_token_table = "resume_tokens"
poll_interval_ms = 500
batch_size = 100

[feed.watch]
# Empty means every operation type
operation_types = []

[leadership]
# Only the process holding the lease runs watchers
enabled = true
group = "tidemark"
ttl_ms = 5000
wait_ms = 1000
# On reconnect, restart watchers only if still leader
recheck_on_reconnect = true

[connection]
health_check_interval_ms = 1000

[restart]
initial_delay_ms = 500
max_delay_ms = 30000
backoff_multiplier = 2.0

[handler]
kind = "log"  # log | webhook
# url = "https://example.com/hooks/changes"
timeout_seconds = 30

[logging]
local_enabled = false
local_path = "./logs"
local_rotation = "daily"  # daily | hourly | never
json = false
"#
        .to_string()
    }
}
