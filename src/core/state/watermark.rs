//! Resume watermark model
//!
//! A watermark records, per collection, the position of the last event whose
//! handler completed successfully. There is at most one watermark per
//! collection; saving always overwrites.

use crate::domain::ids::{CollectionName, ResumeToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resume watermark for one collection
///
/// # Examples
///
/// ```
/// use tidemark::core::state::watermark::ResumeWatermark;
/// use tidemark::domain::ids::{CollectionName, ResumeToken};
///
/// let collection = CollectionName::new("orders").unwrap();
/// let watermark = ResumeWatermark::new(collection, ResumeToken::from(12));
///
/// assert_eq!(watermark.token.as_i64(), Some(12));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeWatermark {
    /// Collection this watermark tracks (unique key)
    pub collection_name: CollectionName,

    /// Position of the last successfully handled event
    pub token: ResumeToken,

    /// When the watermark was last written
    pub updated_at: DateTime<Utc>,
}

impl ResumeWatermark {
    /// Create a watermark stamped with the current time
    pub fn new(collection_name: CollectionName, token: ResumeToken) -> Self {
        Self {
            collection_name,
            token,
            updated_at: Utc::now(),
        }
    }

    /// Create a watermark with an explicit timestamp (used when loading)
    pub fn with_updated_at(
        collection_name: CollectionName,
        token: ResumeToken,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            collection_name,
            token,
            updated_at,
        }
    }

    /// Time elapsed since the watermark was last advanced
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.updated_at
    }
}
