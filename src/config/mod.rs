//! Configuration management for Tidemark.
//!
//! TOML configuration with:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `TIDEMARK_<SECTION>_<KEY>` overrides
//! - Defaults for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tidemark::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("tidemark.toml")?;
//! println!("Watching: {}", config.feed.collections.join(", "));
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [postgresql]
//! connection_string = "${TIDEMARK_DATABASE_URL}"
//!
//! [feed]
//! collections = ["orders", "payments"]
//!
//! [leadership]
//! group = "order-sync"
//! ttl_ms = 5000
//! wait_ms = 1000
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApplicationConfig, ConnectionConfig, FeedConfig, HandlerConfig, HandlerKind,
    LeadershipConfig, LogRotation, LoggingConfig, PostgreSQLConfig, RestartConfig,
    TidemarkConfig,
};
pub use secret::{redacted_connection_string, secret_string, SecretString, SecretValue};
