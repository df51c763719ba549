//! In-memory change feed
//!
//! An append-only event log per collection with resumable subscriptions.
//! Positions are sequence numbers starting at 1. Beyond appending events it
//! lets callers inject the notifications a real feed produces on its own
//! (errors, end, close, a dropped collection), which is what the watcher
//! tests drive.

use crate::adapters::feed::channel::ChannelSubscription;
use crate::adapters::feed::traits::{
    ChangeFeed, FeedNotification, SubscribeRequest, Subscription, WatchOptions,
};
use crate::domain::errors::FeedError;
use crate::domain::event::{ChangeEvent, OperationType};
use crate::domain::ids::{CollectionName, ResumeToken};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify};

#[derive(Default)]
struct CollectionLog {
    events: Vec<ChangeEvent>,
    last_sequence: i64,
    dropped: bool,
    controls: Vec<mpsc::UnboundedSender<FeedNotification>>,
    requests: Vec<Option<ResumeToken>>,
}

impl CollectionLog {
    fn next_after(&self, cursor: i64) -> Option<ChangeEvent> {
        self.events
            .iter()
            .find(|e| e.id.as_i64().is_some_and(|seq| seq > cursor))
            .cloned()
    }
}

#[derive(Default)]
struct FeedShared {
    collections: Mutex<HashMap<CollectionName, CollectionLog>>,
    appended: Notify,
}

impl FeedShared {
    fn lock(&self) -> MutexGuard<'_, HashMap<CollectionName, CollectionLog>> {
        // A poisoned lock only means a test panicked mid-update; the map is still usable.
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Process-local change feed
#[derive(Clone, Default)]
pub struct InMemoryChangeFeed {
    shared: Arc<FeedShared>,
}

impl InMemoryChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to a collection's log and wake its subscriptions
    pub fn append(
        &self,
        collection: &CollectionName,
        operation: OperationType,
        payload: serde_json::Value,
    ) -> ChangeEvent {
        let event = {
            let mut collections = self.shared.lock();
            let log = collections.entry(collection.clone()).or_default();
            log.dropped = false;
            log.last_sequence += 1;
            let event = ChangeEvent {
                id: ResumeToken::from(log.last_sequence),
                collection: collection.clone(),
                operation,
                document_key: None,
                payload,
                cluster_time: Utc::now(),
            };
            log.events.push(event.clone());
            event
        };
        self.shared.appended.notify_waiters();
        event
    }

    /// Deliver a notification to every live subscription of a collection
    pub fn emit(&self, collection: &CollectionName, notification: FeedNotification) {
        let mut collections = self.shared.lock();
        if let Some(log) = collections.get_mut(collection) {
            log.controls.retain(|tx| tx.send(notification.clone()).is_ok());
        }
    }

    /// Drop a collection: live subscriptions receive a fatal error and new
    /// subscriptions are refused until an event is appended again
    pub fn drop_collection(&self, collection: &CollectionName) {
        {
            let mut collections = self.shared.lock();
            let log = collections.entry(collection.clone()).or_default();
            log.dropped = true;
        }
        self.emit(
            collection,
            FeedNotification::Error(FeedError::NamespaceNotFound(collection.to_string())),
        );
    }

    /// Number of subscriptions ever opened for a collection
    pub fn subscribe_count(&self, collection: &CollectionName) -> usize {
        self.shared
            .lock()
            .get(collection)
            .map_or(0, |log| log.requests.len())
    }

    /// Resume positions requested by each subscription, oldest first
    pub fn resume_positions(&self, collection: &CollectionName) -> Vec<Option<ResumeToken>> {
        self.shared
            .lock()
            .get(collection)
            .map(|log| log.requests.clone())
            .unwrap_or_default()
    }

    /// Number of subscriptions currently open for a collection
    pub fn live_subscriptions(&self, collection: &CollectionName) -> usize {
        self.shared
            .lock()
            .get(collection)
            .map_or(0, |log| log.controls.iter().filter(|tx| !tx.is_closed()).count())
    }
}

#[async_trait]
impl ChangeFeed for InMemoryChangeFeed {
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> std::result::Result<Box<dyn Subscription>, FeedError> {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let cursor = {
            let mut collections = self.shared.lock();
            let log = collections.entry(request.collection.clone()).or_default();
            if log.dropped {
                return Err(FeedError::NamespaceNotFound(request.collection.to_string()));
            }
            log.requests.push(request.resume_after.clone());

            let cursor = match &request.resume_after {
                Some(token) => token.as_i64().ok_or_else(|| {
                    FeedError::InvalidResumeToken(format!("expected a sequence number, got {token}"))
                })?,
                None => log.last_sequence,
            };
            log.controls.push(control_tx);
            cursor
        };

        let shared = self.shared.clone();
        Ok(Box::new(ChannelSubscription::spawn(move |tx| {
            pump(
                shared,
                request.collection,
                cursor,
                request.options,
                tx,
                control_rx,
            )
        })))
    }
}

async fn pump(
    shared: Arc<FeedShared>,
    collection: CollectionName,
    mut cursor: i64,
    options: WatchOptions,
    tx: mpsc::Sender<FeedNotification>,
    mut control: mpsc::UnboundedReceiver<FeedNotification>,
) {
    loop {
        let appended = shared.appended.notified();
        tokio::pin!(appended);
        appended.as_mut().enable();

        let next = shared
            .lock()
            .get(&collection)
            .and_then(|log| log.next_after(cursor));

        if let Some(event) = next {
            cursor = event.id.as_i64().unwrap_or(cursor);
            if !options.accepts(&event.operation) {
                continue;
            }
            if tx.send(FeedNotification::Change(event)).await.is_err() {
                return;
            }
            continue;
        }

        tokio::select! {
            _ = &mut appended => {}
            notification = control.recv() => {
                let Some(notification) = notification else { return };
                let terminal = notification.is_terminal();
                if tx.send(notification).await.is_err() || terminal {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders() -> CollectionName {
        CollectionName::new("orders").unwrap()
    }

    fn request(resume_after: Option<ResumeToken>) -> SubscribeRequest {
        SubscribeRequest {
            collection: orders(),
            resume_after,
            options: WatchOptions::default(),
        }
    }

    async fn next_change(sub: &mut Box<dyn Subscription>) -> ChangeEvent {
        match sub.next().await {
            Some(FeedNotification::Change(event)) => event,
            other => panic!("expected change, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_without_token_starts_at_tail() {
        let feed = InMemoryChangeFeed::new();
        feed.append(&orders(), OperationType::Insert, json!({"n": 1}));

        let mut sub = feed.subscribe(request(None)).await.unwrap();
        feed.append(&orders(), OperationType::Insert, json!({"n": 2}));

        let event = next_change(&mut sub).await;
        assert_eq!(event.id, ResumeToken::from(2));
    }

    #[tokio::test]
    async fn test_subscribe_resumes_strictly_after_token() {
        let feed = InMemoryChangeFeed::new();
        for n in 1..=3 {
            feed.append(&orders(), OperationType::Insert, json!({ "n": n }));
        }

        let mut sub = feed
            .subscribe(request(Some(ResumeToken::from(1))))
            .await
            .unwrap();

        assert_eq!(next_change(&mut sub).await.id, ResumeToken::from(2));
        assert_eq!(next_change(&mut sub).await.id, ResumeToken::from(3));
        assert_eq!(
            feed.resume_positions(&orders()),
            vec![Some(ResumeToken::from(1))]
        );
    }

    #[tokio::test]
    async fn test_operation_filter_skips_events() {
        let feed = InMemoryChangeFeed::new();
        let mut req = request(Some(ResumeToken::from(0)));
        req.options.operation_types = vec![OperationType::Delete];

        feed.append(&orders(), OperationType::Insert, json!({}));
        feed.append(&orders(), OperationType::Delete, json!({}));

        let mut sub = feed.subscribe(req).await.unwrap();
        let event = next_change(&mut sub).await;
        assert_eq!(event.operation, OperationType::Delete);
        assert_eq!(event.id, ResumeToken::from(2));
    }

    #[tokio::test]
    async fn test_emit_close_terminates_subscription() {
        let feed = InMemoryChangeFeed::new();
        let mut sub = feed.subscribe(request(None)).await.unwrap();
        assert_eq!(feed.live_subscriptions(&orders()), 1);

        feed.emit(&orders(), FeedNotification::Close);
        assert_eq!(sub.next().await, Some(FeedNotification::Close));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_dropped_collection_refuses_subscriptions() {
        let feed = InMemoryChangeFeed::new();
        let mut sub = feed.subscribe(request(None)).await.unwrap();

        feed.drop_collection(&orders());
        assert!(matches!(
            sub.next().await,
            Some(FeedNotification::Error(FeedError::NamespaceNotFound(_)))
        ));
        assert!(matches!(
            feed.subscribe(request(None)).await,
            Err(FeedError::NamespaceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_non_numeric_token_is_rejected() {
        let feed = InMemoryChangeFeed::new();
        let result = feed
            .subscribe(request(Some(ResumeToken::new(json!("abc")))))
            .await;
        assert!(matches!(result, Err(FeedError::InvalidResumeToken(_))));
    }

    #[tokio::test]
    async fn test_close_releases_subscription() {
        let feed = InMemoryChangeFeed::new();
        let mut sub = feed.subscribe(request(None)).await.unwrap();
        sub.close().await;
        tokio::task::yield_now().await;

        // The pump task is gone, so the control channel is closed.
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while feed.live_subscriptions(&orders()) != 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
