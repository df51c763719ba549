//! Watermark store abstraction
//!
//! This module defines the trait that resume watermark backends must
//! implement.

use crate::core::state::watermark::ResumeWatermark;
use crate::domain::ids::{CollectionName, ResumeToken};
use crate::domain::Result;
use async_trait::async_trait;

/// Resume watermark store
///
/// Persists the last handled position per collection. The store is shared
/// between processes for crash recovery but has exactly one writer per
/// collection at a time (the elected leader), so it needs no
/// compare-and-set.
///
/// Backend failures are reported as
/// [`TidemarkError::StoreUnavailable`](crate::domain::TidemarkError::StoreUnavailable).
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Load the watermark for a collection
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(ResumeWatermark))` if found, `Ok(None)` on first run
    /// or after a reset.
    async fn get(&self, collection: &CollectionName) -> Result<Option<ResumeWatermark>>;

    /// Upsert the watermark for a collection
    ///
    /// On success the new token is visible to every subsequent `get`,
    /// from any process sharing the backend.
    async fn put(&self, collection: &CollectionName, token: &ResumeToken) -> Result<()>;

    /// List every stored watermark, ordered by collection name
    async fn list(&self) -> Result<Vec<ResumeWatermark>>;

    /// Delete the watermark for a collection
    ///
    /// Administrative only: forces the next start to subscribe from the
    /// tail. Returns `true` if a watermark existed.
    async fn delete(&self, collection: &CollectionName) -> Result<bool>;
}
