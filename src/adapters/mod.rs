//! External system integrations for Tidemark.
//!
//! Ports (traits) and their implementations:
//!
//! - [`database`] - Resume watermark store port and the backend factory
//! - [`feed`] - Change feed port
//! - [`cluster`] - Connection liveness and leadership ports
//! - [`postgresql`] - PostgreSQL implementation of every port
//! - [`memory`] - In-process implementations for tests and embedding
//!
//! # Example
//!
//! ```rust,no_run
//! use tidemark::adapters::database::create_backend;
//! use tidemark::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("tidemark.toml")?;
//! let backend = create_backend(&config).await?;
//! println!("Connected to {}", backend.client.connection_string_safe());
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod database;
pub mod feed;
pub mod memory;
pub mod postgresql;
