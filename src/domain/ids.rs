//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that flow through the watcher:
//! the name of a watched collection and the opaque resume token issued by a
//! change feed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Maximum accepted length for a collection name
const MAX_COLLECTION_NAME_LEN: usize = 255;

/// Collection name newtype wrapper
///
/// Identifies a watched collection. It is also the key under which the
/// collection's resume watermark is stored.
///
/// # Examples
///
/// ```
/// use tidemark::domain::ids::CollectionName;
/// use std::str::FromStr;
///
/// let name = CollectionName::from_str("orders").unwrap();
/// assert_eq!(name.as_str(), "orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionName(String);

impl CollectionName {
    /// Creates a new CollectionName from a string
    ///
    /// # Arguments
    ///
    /// * `name` - The collection name
    ///
    /// # Returns
    ///
    /// Returns `Ok(CollectionName)` if the name is valid, `Err` otherwise
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("Collection name cannot be empty".to_string());
        }
        if name.len() > MAX_COLLECTION_NAME_LEN {
            return Err(format!(
                "Collection name exceeds {} characters: {}",
                MAX_COLLECTION_NAME_LEN, name
            ));
        }
        if name.contains('\0') {
            return Err("Collection name cannot contain NUL characters".to_string());
        }
        Ok(Self(name))
    }

    /// Returns the collection name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CollectionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resume token newtype wrapper
///
/// An opaque position issued by a change feed. The watcher never looks
/// inside it; it only hands it back to the feed to resume strictly after the
/// position it marks.
///
/// # Examples
///
/// ```
/// use tidemark::domain::ids::ResumeToken;
///
/// let token = ResumeToken::from(42_i64);
/// assert_eq!(token.as_i64(), Some(42));
/// assert_eq!(token.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeToken(Value);

impl ResumeToken {
    /// Wraps a raw feed position
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the raw token value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes self and returns the raw token value
    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Interprets the token as an integer sequence number
    ///
    /// Feeds that use monotonically increasing sequence numbers as positions
    /// (the PostgreSQL outbox and the in-memory feed) use this accessor.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.as_i64()
    }
}

impl From<i64> for ResumeToken {
    fn from(sequence: i64) -> Self {
        Self(Value::from(sequence))
    }
}

impl From<Value> for ResumeToken {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
