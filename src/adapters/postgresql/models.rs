//! PostgreSQL row models
//!
//! Intermediate structs between `tokio_postgres::Row` and domain types.

use crate::core::state::watermark::ResumeWatermark;
use crate::domain::event::{ChangeEvent, OperationType};
use crate::domain::ids::{CollectionName, ResumeToken};
use crate::domain::{Result, TidemarkError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_postgres::Row;

/// Position in an events table
///
/// Rows are read in `(txid, id)` order, where `txid` is the id of the
/// transaction that wrote the row. Serialized as `{"txid": .., "id": ..}`
/// inside a resume token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeedPosition {
    pub txid: i64,
    pub id: i64,
}

impl FeedPosition {
    pub fn to_token(self) -> ResumeToken {
        ResumeToken::new(serde_json::json!({ "txid": self.txid, "id": self.id }))
    }

    /// Parse a token issued by [`FeedPosition::to_token`]
    pub fn from_token(token: &ResumeToken) -> Option<Self> {
        serde_json::from_value(token.as_value().clone()).ok()
    }
}

/// Row of the resume token table
#[derive(Debug, Clone)]
pub struct PostgreSQLResumeToken {
    pub collection_name: String,
    pub token: Value,
    pub updated_at: DateTime<Utc>,
}

impl PostgreSQLResumeToken {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            collection_name: try_get(row, "collection_name")?,
            token: try_get(row, "token")?,
            updated_at: try_get(row, "updated_at")?,
        })
    }

    /// Convert to domain ResumeWatermark
    pub fn to_domain(&self) -> Result<ResumeWatermark> {
        let collection =
            CollectionName::new(&self.collection_name).map_err(TidemarkError::Validation)?;
        Ok(ResumeWatermark::with_updated_at(
            collection,
            ResumeToken::new(self.token.clone()),
            self.updated_at,
        ))
    }
}

/// Row of the change events table
#[derive(Debug, Clone)]
pub struct PostgreSQLChangeEvent {
    pub txid: i64,
    pub id: i64,
    pub collection_name: String,
    pub operation: String,
    pub document_key: Option<Value>,
    pub payload: Value,
    pub cluster_time: DateTime<Utc>,
}

impl PostgreSQLChangeEvent {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            txid: try_get(row, "txid")?,
            id: try_get(row, "id")?,
            collection_name: try_get(row, "collection_name")?,
            operation: try_get(row, "operation")?,
            document_key: try_get(row, "document_key")?,
            payload: try_get(row, "payload")?,
            cluster_time: try_get(row, "cluster_time")?,
        })
    }

    pub fn position(&self) -> FeedPosition {
        FeedPosition {
            txid: self.txid,
            id: self.id,
        }
    }

    /// Convert to domain ChangeEvent; the row position becomes the resume token
    pub fn to_domain(&self) -> Result<ChangeEvent> {
        let collection =
            CollectionName::new(&self.collection_name).map_err(TidemarkError::Validation)?;
        let operation: OperationType = self
            .operation
            .parse()
            .map_err(TidemarkError::Validation)?;

        Ok(ChangeEvent {
            id: self.position().to_token(),
            collection,
            operation,
            document_key: self.document_key.clone(),
            payload: self.payload.clone(),
            cluster_time: self.cluster_time,
        })
    }
}

fn try_get<'a, T>(row: &'a Row, column: &str) -> Result<T>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(column).map_err(|e| {
        TidemarkError::Serialization(format!("Failed to read column '{}': {}", column, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_event_row_to_domain() {
        let row = PostgreSQLChangeEvent {
            txid: 905,
            id: 17,
            collection_name: "orders".to_string(),
            operation: "update".to_string(),
            document_key: Some(json!({"_id": 3})),
            payload: json!({"status": "paid"}),
            cluster_time: Utc::now(),
        };

        let event = row.to_domain().unwrap();
        assert_eq!(event.id.as_value(), &json!({"txid": 905, "id": 17}));
        assert_eq!(
            FeedPosition::from_token(&event.id),
            Some(FeedPosition { txid: 905, id: 17 })
        );
        assert_eq!(event.operation, OperationType::Update);
        assert_eq!(event.document_key, Some(json!({"_id": 3})));
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let row = PostgreSQLChangeEvent {
            txid: 900,
            id: 1,
            collection_name: "orders".to_string(),
            operation: "upsert".to_string(),
            document_key: None,
            payload: json!({}),
            cluster_time: Utc::now(),
        };
        assert!(matches!(row.to_domain(), Err(TidemarkError::Validation(_))));
    }

    #[test]
    fn test_resume_token_row_to_domain() {
        let updated_at = Utc::now();
        let row = PostgreSQLResumeToken {
            collection_name: "orders".to_string(),
            token: json!(42),
            updated_at,
        };

        let watermark = row.to_domain().unwrap();
        assert_eq!(watermark.collection_name.as_str(), "orders");
        assert_eq!(watermark.token.as_i64(), Some(42));
        assert_eq!(watermark.updated_at, updated_at);
    }

    #[test]
    fn test_positions_order_by_transaction_first() {
        let early_tx_late_id = FeedPosition { txid: 100, id: 8 };
        let late_tx_early_id = FeedPosition { txid: 101, id: 7 };
        assert!(early_tx_late_id < late_tx_early_id);
    }

    #[test]
    fn test_plain_sequence_token_is_not_a_position() {
        assert_eq!(FeedPosition::from_token(&ResumeToken::from(42)), None);
        assert_eq!(
            FeedPosition::from_token(&ResumeToken::new(json!({"id": 42}))),
            None
        );
    }
}
