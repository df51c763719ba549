//! State manager for watermark persistence
//!
//! This module provides the StateManager used by watchers to read their
//! resume position and to checkpoint after each handled event.

use crate::adapters::database::traits::WatermarkStore;
use crate::core::state::watermark::ResumeWatermark;
use crate::domain::ids::{CollectionName, ResumeToken};
use crate::domain::Result;
use std::sync::Arc;

/// State manager for watermark persistence
///
/// Cheap to clone; every clone shares the same backing store.
#[derive(Clone)]
pub struct StateManager {
    /// Watermark store backend
    store: Arc<dyn WatermarkStore>,
}

impl StateManager {
    /// Create a new StateManager with a watermark store backend
    pub fn new_with_store(store: Arc<dyn WatermarkStore>) -> Self {
        Self { store }
    }

    /// Load the resume token for a collection
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(token))` if a watermark exists, `Ok(None)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the backend cannot be read.
    pub async fn load_token(&self, collection: &CollectionName) -> Result<Option<ResumeToken>> {
        let watermark = self.store.get(collection).await?;
        Ok(watermark.map(|w| w.token))
    }

    /// Load the full watermark record for a collection
    pub async fn load_watermark(
        &self,
        collection: &CollectionName,
    ) -> Result<Option<ResumeWatermark>> {
        self.store.get(collection).await
    }

    /// Checkpoint a handled event by saving its position
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the upsert fails.
    pub async fn checkpoint(&self, collection: &CollectionName, token: &ResumeToken) -> Result<()> {
        crate::log_checkpoint!(collection, token);
        self.store.put(collection, token).await
    }

    /// Get all watermarks
    pub async fn get_all_watermarks(&self) -> Result<Vec<ResumeWatermark>> {
        self.store.list().await
    }

    /// Remove the watermark for a collection so it resyncs from the tail
    pub async fn reset(&self, collection: &CollectionName) -> Result<bool> {
        tracing::warn!(collection = %collection, "Resetting resume watermark");
        self.store.delete(collection).await
    }
}
