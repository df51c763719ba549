//! In-memory watermark store
//!
//! Keeps watermarks in a process-local map. Suitable for tests and for
//! embedding where crash recovery is not required. Availability can be
//! toggled to exercise the `StoreUnavailable` paths.

use crate::adapters::database::traits::WatermarkStore;
use crate::core::state::watermark::ResumeWatermark;
use crate::domain::ids::{CollectionName, ResumeToken};
use crate::domain::{Result, TidemarkError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Process-local watermark store
#[derive(Default)]
pub struct InMemoryWatermarkStore {
    watermarks: RwLock<BTreeMap<CollectionName, ResumeWatermark>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreUnavailable` (or recover)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `put` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TidemarkError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn get(&self, collection: &CollectionName) -> Result<Option<ResumeWatermark>> {
        self.check_available()?;
        Ok(self.watermarks.read().await.get(collection).cloned())
    }

    async fn put(&self, collection: &CollectionName, token: &ResumeToken) -> Result<()> {
        self.check_available()?;
        self.watermarks.write().await.insert(
            collection.clone(),
            ResumeWatermark::new(collection.clone(), token.clone()),
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ResumeWatermark>> {
        self.check_available()?;
        Ok(self.watermarks.read().await.values().cloned().collect())
    }

    async fn delete(&self, collection: &CollectionName) -> Result<bool> {
        self.check_available()?;
        Ok(self.watermarks.write().await.remove(collection).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_upserts_single_record() {
        let store = InMemoryWatermarkStore::new();
        let orders = CollectionName::new("orders").unwrap();

        store.put(&orders, &ResumeToken::from(1)).await.unwrap();
        store.put(&orders, &ResumeToken::from(2)).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].token, ResumeToken::from(2));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_collection() {
        let store = InMemoryWatermarkStore::new();
        for name in ["payments", "customers", "orders"] {
            store
                .put(&CollectionName::new(name).unwrap(), &ResumeToken::from(1))
                .await
                .unwrap();
        }

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.collection_name.into_inner())
            .collect();
        assert_eq!(names, vec!["customers", "orders", "payments"]);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = InMemoryWatermarkStore::new();
        let orders = CollectionName::new("orders").unwrap();
        store.set_unavailable(true);

        assert!(matches!(
            store.get(&orders).await,
            Err(TidemarkError::StoreUnavailable(_))
        ));
        assert!(store.put(&orders, &ResumeToken::from(1)).await.is_err());
        assert_eq!(store.write_count(), 0);

        store.set_unavailable(false);
        assert!(store.get(&orders).await.unwrap().is_none());
    }
}
