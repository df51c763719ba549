//! Built-in change handlers
//!
//! A [`ChangeHandler`] receives each change event in order. Returning an
//! error keeps the watermark where it was.
//!
//! - [`LogHandler`] - logs every change
//! - [`WebhookHandler`] - POSTs every change as JSON

pub mod log;
pub mod webhook;

pub use self::log::LogHandler;
pub use webhook::WebhookHandler;

use crate::config::schema::{HandlerConfig, HandlerKind};
use crate::domain::event::ChangeEvent;
use crate::domain::{Result, TidemarkError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Consumer of change events
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    /// Handle one event
    ///
    /// # Errors
    ///
    /// Any error means the event was not handled; it is logged and the
    /// watermark is not advanced.
    async fn handle(&self, event: &ChangeEvent) -> anyhow::Result<()>;
}

/// Build the handler selected in configuration
///
/// # Errors
///
/// Returns a configuration error if a webhook handler cannot be built
pub fn create_handler(config: &HandlerConfig) -> Result<Arc<dyn ChangeHandler>> {
    match config.kind {
        HandlerKind::Log => Ok(Arc::new(LogHandler::new())),
        HandlerKind::Webhook => {
            let url = config.url.as_deref().ok_or_else(|| {
                TidemarkError::Configuration("handler.url is required for webhooks".to_string())
            })?;
            let handler =
                WebhookHandler::new(url, Duration::from_secs(config.timeout_seconds))?;
            Ok(Arc::new(handler))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_log_handler() {
        assert!(create_handler(&HandlerConfig::default()).is_ok());
    }

    #[test]
    fn test_webhook_without_url_fails() {
        let config = HandlerConfig {
            kind: HandlerKind::Webhook,
            url: None,
            timeout_seconds: 5,
        };
        assert!(matches!(
            create_handler(&config),
            Err(TidemarkError::Configuration(_))
        ));
    }
}
