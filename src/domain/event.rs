//! Change event domain model
//!
//! A change event is one mutation notification emitted by a change feed. The
//! watcher treats its payload as opaque; only the `id` (the resume token for
//! the event's position) is interpreted, and only by the feed that issued it.

use super::ids::{CollectionName, ResumeToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of the mutation that produced a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Insert,
    Update,
    Replace,
    Delete,
    /// The watched collection was dropped
    Drop,
    /// The watched collection was renamed
    Rename,
    /// The collection's database was dropped
    DropDatabase,
    /// The feed can no longer produce events for this subscription
    Invalidate,
}

impl OperationType {
    /// Returns the wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Drop => "drop",
            Self::Rename => "rename",
            Self::DropDatabase => "drop_database",
            Self::Invalidate => "invalidate",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "replace" => Ok(Self::Replace),
            "delete" => Ok(Self::Delete),
            "drop" => Ok(Self::Drop),
            "rename" => Ok(Self::Rename),
            "drop_database" | "dropdatabase" => Ok(Self::DropDatabase),
            "invalidate" => Ok(Self::Invalidate),
            other => Err(format!("Unknown operation type: {other}")),
        }
    }
}

/// A change event delivered to a watch handler
///
/// # Examples
///
/// ```
/// use tidemark::domain::event::{ChangeEvent, OperationType};
/// use tidemark::domain::ids::CollectionName;
/// use serde_json::json;
///
/// let event = ChangeEvent::builder()
///     .id(1_i64)
///     .collection(CollectionName::new("orders").unwrap())
///     .operation(OperationType::Insert)
///     .payload(json!({"sku": "A-1"}))
///     .build()
///     .unwrap();
///
/// assert_eq!(event.id.as_i64(), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Position of this event; written as the watermark once handled
    pub id: ResumeToken,

    /// Collection the event belongs to
    pub collection: CollectionName,

    /// Kind of mutation
    pub operation: OperationType,

    /// Key of the mutated document, when the feed provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_key: Option<serde_json::Value>,

    /// Opaque event payload
    pub payload: serde_json::Value,

    /// When the upstream source recorded the mutation
    pub cluster_time: DateTime<Utc>,
}

impl ChangeEvent {
    /// Creates a new builder for constructing a ChangeEvent
    pub fn builder() -> ChangeEventBuilder {
        ChangeEventBuilder::default()
    }
}

/// Builder for constructing ChangeEvent instances
#[derive(Debug, Default)]
pub struct ChangeEventBuilder {
    id: Option<ResumeToken>,
    collection: Option<CollectionName>,
    operation: Option<OperationType>,
    document_key: Option<serde_json::Value>,
    payload: Option<serde_json::Value>,
    cluster_time: Option<DateTime<Utc>>,
}

impl ChangeEventBuilder {
    /// Creates a new ChangeEventBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event position
    pub fn id(mut self, id: impl Into<ResumeToken>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the collection
    pub fn collection(mut self, collection: CollectionName) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Sets the operation type
    pub fn operation(mut self, operation: OperationType) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Sets the document key
    pub fn document_key(mut self, key: serde_json::Value) -> Self {
        self.document_key = Some(key);
        self
    }

    /// Sets the payload
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets the cluster time (defaults to now)
    pub fn cluster_time(mut self, time: DateTime<Utc>) -> Self {
        self.cluster_time = Some(time);
        self
    }

    /// Builds the ChangeEvent
    ///
    /// # Errors
    ///
    /// Returns an error if any required field is missing
    pub fn build(self) -> Result<ChangeEvent, String> {
        Ok(ChangeEvent {
            id: self.id.ok_or("id is required")?,
            collection: self.collection.ok_or("collection is required")?,
            operation: self.operation.ok_or("operation is required")?,
            document_key: self.document_key,
            payload: self.payload.unwrap_or(serde_json::Value::Null),
            cluster_time: self.cluster_time.unwrap_or_else(Utc::now),
        })
    }
}
