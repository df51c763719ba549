//! Domain error types
//!
//! This module defines the error hierarchy for Tidemark.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Tidemark error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum TidemarkError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The resume watermark store could not be read or written
    #[error("Watermark store unavailable: {0}")]
    StoreUnavailable(String),

    /// Change feed errors
    #[error("Change feed error: {0}")]
    Feed(#[from] FeedError),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// A database statement or pool operation failed
    ///
    /// `sqlstate` carries the server's five-character error code when the
    /// failure came from the server rather than the transport.
    #[error("Database error: {message}")]
    Database {
        message: String,
        sqlstate: Option<String>,
    },

    /// Leadership election errors
    #[error("Leadership error: {0}")]
    Leadership(String),

    /// A change handler failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl TidemarkError {
    /// Whether retrying the failed operation later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) | Self::Connection(_) | Self::Leadership(_) => true,
            Self::Database { .. } => true,
            Self::Feed(err) => !err.is_fatal(),
            _ => false,
        }
    }
}

/// Change feed errors
///
/// Errors raised by a change feed subscription. These errors don't expose
/// driver types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The watched namespace (collection or its database) no longer exists
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Failed to open a subscription
    #[error("Failed to open subscription: {0}")]
    OpenFailed(String),

    /// Subscription-level failure that does not by itself end watching
    #[error("Transient feed error: {0}")]
    Transient(String),

    /// The stored resume token is not accepted by the feed
    #[error("Invalid resume token: {0}")]
    InvalidResumeToken(String),
}

impl FeedError {
    /// Whether the error must suppress any further automatic restart
    ///
    /// Only a missing namespace is fatal: reopening the subscription cannot
    /// succeed until someone recreates it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NamespaceNotFound(_))
    }
}

impl TidemarkError {
    /// Database error without a server error code
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            sqlstate: None,
        }
    }

    /// Server error code of a `Database` error
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Database { sqlstate, .. } => sqlstate.as_deref(),
            _ => None,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for TidemarkError {
    fn from(err: std::io::Error) -> Self {
        TidemarkError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for TidemarkError {
    fn from(err: serde_json::Error) -> Self {
        TidemarkError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for TidemarkError {
    fn from(err: toml::de::Error) -> Self {
        TidemarkError::Configuration(format!("TOML parse error: {err}"))
    }
}
