//! Integration tests for graceful shutdown
//!
//! These tests verify that:
//! - Shutdown signals reach every receiver
//! - An in-flight event finishes and is checkpointed before shutdown returns
//! - No watcher restarts once shutdown has begun
//! - A later process resumes after the last checkpoint

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tidemark::adapters::cluster::LeadershipSource;
use tidemark::adapters::database::WatermarkStore;
use tidemark::adapters::memory::{
    InMemoryChangeFeed, InMemoryWatermarkStore, ManualConnection, ManualLeadership,
};
use tidemark::core::state::StateManager;
use tidemark::core::supervisor::Supervisor;
use tidemark::core::watcher::{
    ChangeFeedWatcher, RestartPolicy, WatchHandlers, WatcherConfig, WatcherState,
};
use tidemark::domain::{CollectionName, OperationType, ResumeToken};
use tokio::sync::{watch, Notify};

const TIMEOUT: Duration = Duration::from_secs(5);

fn orders() -> CollectionName {
    CollectionName::new("orders").unwrap()
}

#[tokio::test]
async fn test_shutdown_signal_channel_creation() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Initially, shutdown should be false
    assert!(!*shutdown_rx.borrow());

    shutdown_tx.send(true).unwrap();

    assert!(*shutdown_rx.borrow());
}

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    assert!(!*shutdown_rx1.borrow());
    assert!(!*shutdown_rx2.borrow());

    shutdown_tx.send(true).unwrap();

    assert!(*shutdown_rx1.borrow());
    assert!(*shutdown_rx2.borrow());
}

/// Watcher whose handler signals `started` and then sleeps for `work`
fn slow_watcher(
    feed: &InMemoryChangeFeed,
    store: Arc<InMemoryWatermarkStore>,
    connection: Arc<ManualConnection>,
    started: Arc<Notify>,
    work: Duration,
) -> ChangeFeedWatcher {
    let handlers = WatchHandlers::new().on_change(move |_event| {
        let started = started.clone();
        async move {
            started.notify_one();
            tokio::time::sleep(work).await;
            anyhow::Ok(())
        }
    });
    ChangeFeedWatcher::new(
        WatcherConfig::new(orders())
            .with_handlers(handlers)
            .with_restart_policy(RestartPolicy::immediate()),
        Arc::new(feed.clone()),
        connection,
        StateManager::new_with_store(store),
    )
}

#[tokio::test]
async fn test_shutdown_checkpoints_in_flight_event() {
    let feed = InMemoryChangeFeed::new();
    let store = Arc::new(InMemoryWatermarkStore::new());
    let connection = Arc::new(ManualConnection::new());
    let leadership = Arc::new(ManualLeadership::new());
    let started = Arc::new(Notify::new());

    let supervisor = Arc::new(Supervisor::new(
        vec![slow_watcher(
            &feed,
            store.clone(),
            connection.clone(),
            started.clone(),
            Duration::from_millis(200),
        )],
        leadership.clone(),
        connection.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.run(shutdown_rx).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    leadership.elect();
    let mut states = supervisor.watchers()[0].subscribe_state();
    tokio::time::timeout(TIMEOUT, states.wait_for(|s| *s == WatcherState::Watching))
        .await
        .expect("watcher did not start")
        .unwrap();

    feed.append(&orders(), OperationType::Insert, json!({ "n": 1 }));
    tokio::time::timeout(TIMEOUT, started.notified())
        .await
        .expect("handler was not invoked");

    // Shut down while the handler is still sleeping
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(TIMEOUT, task)
        .await
        .expect("supervisor did not shut down")
        .unwrap()
        .unwrap();

    let watermark = store.get(&orders()).await.unwrap();
    assert_eq!(watermark.map(|w| w.token), Some(ResumeToken::from(1)));
    assert_eq!(supervisor.watchers()[0].state(), WatcherState::Stopped);
    assert!(!leadership.is_leader());
    assert!(connection.is_closed());
}

#[tokio::test]
async fn test_no_restart_after_shutdown() {
    let feed = InMemoryChangeFeed::new();
    let store = Arc::new(InMemoryWatermarkStore::new());
    let connection = Arc::new(ManualConnection::new());
    let leadership = Arc::new(ManualLeadership::new());
    leadership.set_silently(true);

    let supervisor = Supervisor::new(
        vec![slow_watcher(
            &feed,
            store.clone(),
            connection.clone(),
            Arc::new(Notify::new()),
            Duration::ZERO,
        )],
        leadership,
        connection.clone(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    // Already leader, so the watcher starts and is then stopped by shutdown
    tokio::time::timeout(TIMEOUT, supervisor.run(shutdown_rx))
        .await
        .expect("supervisor did not shut down")
        .unwrap();
    let subscriptions = feed.subscribe_count(&orders());

    feed.append(&orders(), OperationType::Insert, json!({ "n": 1 }));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(feed.subscribe_count(&orders()), subscriptions);
    assert_eq!(feed.live_subscriptions(&orders()), 0);
    assert!(store.get(&orders()).await.unwrap().is_none());
    assert!(supervisor.watchers()[0].is_stop_requested());
}

#[tokio::test]
async fn test_next_process_resumes_after_shutdown() {
    let feed = InMemoryChangeFeed::new();
    let store = Arc::new(InMemoryWatermarkStore::new());

    let first_connection = Arc::new(ManualConnection::new());
    let first_started = Arc::new(Notify::new());
    let first = slow_watcher(
        &feed,
        store.clone(),
        first_connection,
        first_started.clone(),
        Duration::ZERO,
    );
    first.start().await.unwrap();
    feed.append(&orders(), OperationType::Insert, json!({ "n": 1 }));
    tokio::time::timeout(TIMEOUT, first_started.notified())
        .await
        .expect("handler was not invoked");
    tokio::time::timeout(TIMEOUT, async {
        while store.get(&orders()).await.unwrap().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("watermark not written");
    first.stop().await;

    // Written while nobody is watching
    feed.append(&orders(), OperationType::Insert, json!({ "n": 2 }));

    let second = slow_watcher(
        &feed,
        store.clone(),
        Arc::new(ManualConnection::new()),
        Arc::new(Notify::new()),
        Duration::ZERO,
    );
    second.start().await.unwrap();
    tokio::time::timeout(TIMEOUT, async {
        while store.get(&orders()).await.unwrap().map(|w| w.token) != Some(ResumeToken::from(2))
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("second process did not catch up");
    second.stop().await;

    assert_eq!(
        feed.resume_positions(&orders()),
        vec![None, Some(ResumeToken::from(1))]
    );
}
