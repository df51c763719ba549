//! PostgreSQL watermark store
//!
//! One row per collection in the resume token table, upserted on every
//! checkpoint.

use crate::adapters::database::traits::WatermarkStore;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::PostgreSQLResumeToken;
use crate::core::state::watermark::ResumeWatermark;
use crate::domain::ids::{CollectionName, ResumeToken};
use crate::domain::{Result, TidemarkError};
use async_trait::async_trait;
use std::sync::Arc;

/// Watermark store backed by a PostgreSQL table
pub struct PostgreSQLWatermarkStore {
    client: Arc<PostgreSQLClient>,
    table: String,
}

impl PostgreSQLWatermarkStore {
    /// Create a store over `table`
    ///
    /// `table` must already be a validated identifier.
    pub fn new(client: Arc<PostgreSQLClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Any database failure means the store is unavailable to the caller
fn unavailable(err: TidemarkError) -> TidemarkError {
    match err {
        TidemarkError::Database { message, .. } => TidemarkError::StoreUnavailable(message),
        other => other,
    }
}

#[async_trait]
impl WatermarkStore for PostgreSQLWatermarkStore {
    async fn get(&self, collection: &CollectionName) -> Result<Option<ResumeWatermark>> {
        tracing::debug!(collection = %collection, "Loading resume watermark from PostgreSQL");

        let query = format!(
            "SELECT collection_name, token, updated_at FROM {} WHERE collection_name = $1",
            self.table
        );
        let rows = self
            .client
            .query(&query, &[&collection.as_str()])
            .await
            .map_err(unavailable)?;

        match rows.first() {
            Some(row) => {
                let watermark = PostgreSQLResumeToken::from_row(row)?.to_domain()?;
                tracing::debug!(
                    collection = %collection,
                    token = %watermark.token,
                    "Resume watermark loaded"
                );
                Ok(Some(watermark))
            }
            None => {
                tracing::debug!(collection = %collection, "No resume watermark stored");
                Ok(None)
            }
        }
    }

    async fn put(&self, collection: &CollectionName, token: &ResumeToken) -> Result<()> {
        let upsert = format!(
            r#"
            INSERT INTO {} (collection_name, token, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (collection_name)
            DO UPDATE SET token = EXCLUDED.token, updated_at = EXCLUDED.updated_at
            "#,
            self.table
        );
        self.client
            .execute(&upsert, &[&collection.as_str(), token.as_value()])
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ResumeWatermark>> {
        let query = format!(
            "SELECT collection_name, token, updated_at FROM {} ORDER BY collection_name",
            self.table
        );
        let rows = self.client.query(&query, &[]).await.map_err(unavailable)?;
        rows.iter()
            .map(|row| PostgreSQLResumeToken::from_row(row)?.to_domain())
            .collect()
    }

    async fn delete(&self, collection: &CollectionName) -> Result<bool> {
        let statement = format!("DELETE FROM {} WHERE collection_name = $1", self.table);
        let affected = self
            .client
            .execute(&statement, &[&collection.as_str()])
            .await
            .map_err(unavailable)?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_become_store_unavailable() {
        let err = unavailable(TidemarkError::database("connection refused"));
        assert!(matches!(err, TidemarkError::StoreUnavailable(ref m) if m == "connection refused"));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = unavailable(TidemarkError::Validation("bad name".to_string()));
        assert!(matches!(err, TidemarkError::Validation(_)));
    }
}
