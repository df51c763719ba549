//! Change feed abstraction
//!
//! A change feed turns a collection into an ordered stream of
//! [`FeedNotification`]s. Subscriptions hand out one notification at a
//! time: a feed implementation must not buffer more than a single pending
//! event per subscription, so a slow consumer holds the producer back
//! instead of growing a queue.

use crate::domain::errors::FeedError;
use crate::domain::event::{ChangeEvent, OperationType};
use crate::domain::ids::{CollectionName, ResumeToken};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Notification emitted by a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum FeedNotification {
    /// A change event
    Change(ChangeEvent),

    /// A subscription-level error; the subscription may stay open
    Error(FeedError),

    /// The feed has no more events for this subscription
    End,

    /// The subscription was closed by the source
    Close,
}

impl FeedNotification {
    /// Whether the subscription yields nothing after this notification
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Close)
    }
}

/// Feed-specific filters applied when opening a subscription
///
/// Unknown keys are rejected so a misspelt filter does not silently widen
/// the subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchOptions {
    /// Only deliver these operation types (empty = all)
    #[serde(default)]
    pub operation_types: Vec<OperationType>,
}

impl WatchOptions {
    /// Whether an event passes the operation filter
    pub fn accepts(&self, operation: &OperationType) -> bool {
        self.operation_types.is_empty() || self.operation_types.contains(operation)
    }
}

/// Request for a new subscription
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    /// Collection to watch
    pub collection: CollectionName,

    /// Resume strictly after this position; `None` starts at the tail
    pub resume_after: Option<ResumeToken>,

    /// Feed-specific filters
    pub options: WatchOptions,
}

/// Source of change events for named collections
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription
    ///
    /// # Errors
    ///
    /// Returns `FeedError::NamespaceNotFound` when the collection no longer
    /// exists, `FeedError::OpenFailed` for any other failure.
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> std::result::Result<Box<dyn Subscription>, FeedError>;
}

/// Handle to one open subscription
///
/// Dropping the handle deregisters it from the feed.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next notification
    ///
    /// Returns `None` once the subscription is exhausted; callers treat
    /// that like [`FeedNotification::Close`].
    async fn next(&mut self) -> Option<FeedNotification>;

    /// Close the subscription and release its resources
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_notifications() {
        assert!(FeedNotification::End.is_terminal());
        assert!(FeedNotification::Close.is_terminal());
        assert!(!FeedNotification::Error(FeedError::Transient("x".to_string())).is_terminal());
    }

    #[test]
    fn test_watch_options_filter() {
        let all = WatchOptions::default();
        assert!(all.accepts(&OperationType::Delete));

        let inserts_only = WatchOptions {
            operation_types: vec![OperationType::Insert],
        };
        assert!(inserts_only.accepts(&OperationType::Insert));
        assert!(!inserts_only.accepts(&OperationType::Update));
    }
}
