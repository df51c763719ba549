//! Handler that POSTs each change to a URL
//!
//! The body is the change event as JSON. Delivery is at least once, so each
//! request carries an `Idempotency-Key` of `<collection>:<event id>` that the
//! receiver can use to drop duplicates.

use super::ChangeHandler;
use crate::domain::event::ChangeEvent;
use crate::domain::{Result, TidemarkError};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// POSTs every change event as JSON; any non-2xx response is a failure
#[derive(Debug, Clone)]
pub struct WebhookHandler {
    client: Client,
    url: String,
}

impl WebhookHandler {
    /// Create a webhook handler
    ///
    /// # Arguments
    ///
    /// * `url` - Target URL
    /// * `timeout` - Whole-request timeout
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(30)))
            .user_agent(concat!("tidemark/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                TidemarkError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChangeHandler for WebhookHandler {
    async fn handle(&self, event: &ChangeEvent) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header("Idempotency-Key", format!("{}:{}", event.collection, event.id))
            .header("X-Tidemark-Collection", event.collection.as_str())
            .json(event)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("webhook returned {status}: {}", body.trim());
        }

        tracing::debug!(
            event_id = %event.id,
            status = status.as_u16(),
            "Webhook delivered"
        );
        Ok(())
    }
}
