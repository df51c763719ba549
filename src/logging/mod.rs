//! Logging and observability
//!
//! Structured logging built on `tracing`:
//! - human-readable or JSON console output
//! - configurable log levels, overridable with `RUST_LOG`
//! - local file logging with rotation
//!
//! Every watcher runs inside a `watcher` span carrying its collection name,
//! so events logged from watcher code are attributed without repeating it.
//!
//! # Example
//!
//! ```no_run
//! use tidemark::logging::init_logging;
//! use tidemark::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a watermark checkpoint
///
/// # Example
///
/// ```no_run
/// use tidemark::log_checkpoint;
/// use tidemark::domain::{CollectionName, ResumeToken};
///
/// let collection = CollectionName::new("orders").unwrap();
/// log_checkpoint!(&collection, &ResumeToken::from(42));
/// ```
#[macro_export]
macro_rules! log_checkpoint {
    ($collection:expr, $token:expr) => {
        tracing::debug!(
            collection = %$collection,
            token = %$token,
            "Checkpointing resume watermark"
        );
    };
}

/// Log a watcher restart
///
/// # Example
///
/// ```no_run
/// use tidemark::log_restart;
/// use tidemark::domain::CollectionName;
/// use std::time::Duration;
///
/// let collection = CollectionName::new("orders").unwrap();
/// log_restart!(&collection, 3, Duration::from_millis(400));
/// ```
#[macro_export]
macro_rules! log_restart {
    ($collection:expr, $attempt:expr, $delay:expr) => {
        tracing::info!(
            collection = %$collection,
            attempt = $attempt,
            delay_ms = $delay.as_millis() as u64,
            "Restarting change feed subscription"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use tidemark::log_error_with_context;
/// use tidemark::domain::TidemarkError;
///
/// let error = TidemarkError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::{CollectionName, ResumeToken, TidemarkError};
    use std::time::Duration;

    #[test]
    fn test_macros_expand_without_subscriber() {
        let collection = CollectionName::new("orders").unwrap();
        log_checkpoint!(&collection, &ResumeToken::from(1));
        log_restart!(&collection, 2, Duration::from_millis(10));
        log_error_with_context!(TidemarkError::Other("boom".to_string()), "test");
    }
}
