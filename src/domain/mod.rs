//! Domain models and types for Tidemark.
//!
//! This module contains the core domain models and error types shared by
//! the watcher, the supervisor and the adapters.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`CollectionName`], [`ResumeToken`])
//! - **Change events** ([`ChangeEvent`], [`OperationType`])
//! - **Error types** ([`TidemarkError`], [`FeedError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, TidemarkError>`]:
//!
//! ```rust
//! use tidemark::domain::{CollectionName, Result, TidemarkError};
//!
//! fn parse(name: &str) -> Result<CollectionName> {
//!     CollectionName::new(name).map_err(TidemarkError::Validation)
//! }
//!
//! assert!(parse("orders").is_ok());
//! assert!(parse("").is_err());
//! ```

pub mod errors;
pub mod event;
pub mod ids;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{FeedError, TidemarkError};
pub use event::{ChangeEvent, ChangeEventBuilder, OperationType};
pub use ids::{CollectionName, ResumeToken};
pub use result::Result;
