//! Change-feed watcher
//!
//! Owns one subscription on one collection. Events are handed to the change
//! callback one at a time and the resume watermark is written after each
//! successful callback. When the subscription ends or closes the watcher
//! reopens it from the latest watermark unless a stop was requested.

use crate::adapters::cluster::traits::Connection;
use crate::adapters::feed::traits::{
    ChangeFeed, FeedNotification, SubscribeRequest, Subscription, WatchOptions,
};
use crate::core::state::StateManager;
use crate::core::watcher::handlers::WatchHandlers;
use crate::core::watcher::restart::RestartPolicy;
use crate::core::watcher::state::WatcherState;
use crate::domain::errors::FeedError;
use crate::domain::event::ChangeEvent;
use crate::domain::ids::{CollectionName, ResumeToken};
use crate::domain::Result;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Collection to watch
    pub collection: CollectionName,

    /// Feed-specific filters
    pub watch: WatchOptions,

    /// Callbacks
    pub handlers: WatchHandlers,

    /// Backoff between consecutive restarts
    pub restart: RestartPolicy,
}

impl WatcherConfig {
    pub fn new(collection: CollectionName) -> Self {
        Self {
            collection,
            watch: WatchOptions::default(),
            handlers: WatchHandlers::default(),
            restart: RestartPolicy::default(),
        }
    }

    pub fn with_watch_options(mut self, watch: WatchOptions) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_handlers(mut self, handlers: WatchHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_restart_policy(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }
}

/// How a subscription stopped being consumed
enum Outcome {
    /// `stop()` or `start()` replaced this worker
    Shutdown,
    /// The collection no longer exists; the stop flag is set
    Fatal,
    /// End or close from the feed
    Terminated { delivered: bool },
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Signal the worker and wait for it; an in-flight handler runs to completion
    async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                tracing::error!("Watcher task panicked");
            }
        }
    }
}

struct WatcherInner {
    config: WatcherConfig,
    feed: Arc<dyn ChangeFeed>,
    connection: Arc<dyn Connection>,
    state_manager: StateManager,
    state: watch::Sender<WatcherState>,
    stop_requested: AtomicBool,
    worker: Mutex<Option<Worker>>,
    span: tracing::Span,
}

/// Resilient watcher over one collection's change feed
///
/// Cheap to clone; clones control the same watcher.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tidemark::adapters::memory::{InMemoryChangeFeed, InMemoryWatermarkStore, ManualConnection};
/// use tidemark::core::state::StateManager;
/// use tidemark::core::watcher::{ChangeFeedWatcher, WatchHandlers, WatcherConfig};
/// use tidemark::domain::CollectionName;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = WatcherConfig::new(CollectionName::new("orders")?).with_handlers(
///     WatchHandlers::new().on_change(|event| async move {
///         println!("{}", event.payload);
///         Ok(())
///     }),
/// );
///
/// let watcher = ChangeFeedWatcher::new(
///     config,
///     Arc::new(InMemoryChangeFeed::new()),
///     Arc::new(ManualConnection::new()),
///     StateManager::new_with_store(Arc::new(InMemoryWatermarkStore::new())),
/// );
///
/// watcher.start().await?;
/// watcher.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChangeFeedWatcher {
    inner: Arc<WatcherInner>,
}

impl ChangeFeedWatcher {
    pub fn new(
        config: WatcherConfig,
        feed: Arc<dyn ChangeFeed>,
        connection: Arc<dyn Connection>,
        state_manager: StateManager,
    ) -> Self {
        let span = tracing::info_span!("watcher", collection = %config.collection);
        let (state, _) = watch::channel(WatcherState::Idle);
        Self {
            inner: Arc::new(WatcherInner {
                config,
                feed,
                connection,
                state_manager,
                state,
                stop_requested: AtomicBool::new(false),
                worker: Mutex::new(None),
                span,
            }),
        }
    }

    /// Begin watching
    ///
    /// Does nothing when the connection is not ready. Otherwise closes any
    /// existing subscription, clears the stop flag and opens a subscription
    /// resuming after the stored watermark (or at the tail when there is
    /// none). A watermark read failure at this point falls back to the tail.
    ///
    /// Must not be called from inside one of this watcher's callbacks.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::NamespaceNotFound` when the collection does not
    /// exist; the watcher is then `Stopped` with its stop flag set. Other open
    /// failures are retried in the background and do not surface here.
    pub async fn start(&self) -> Result<()> {
        self.inner
            .clone()
            .start()
            .instrument(self.inner.span.clone())
            .await
    }

    /// Stop watching and wait until the subscription is released
    ///
    /// Waits for an in-flight change callback to finish. Calling `stop()` on
    /// a stopped watcher has no effect.
    pub async fn stop(&self) {
        self.inner.stop().instrument(self.inner.span.clone()).await
    }

    pub fn state(&self) -> WatcherState {
        *self.inner.state.borrow()
    }

    /// Receive every state transition
    pub fn subscribe_state(&self) -> watch::Receiver<WatcherState> {
        self.inner.state.subscribe()
    }

    pub fn collection(&self) -> &CollectionName {
        &self.inner.config.collection
    }

    /// Whether a stop has been requested (or forced by a fatal error)
    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop_requested.load(Ordering::SeqCst)
    }
}

impl WatcherInner {
    fn set_state(&self, next: WatcherState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::trace!(from = %current, to = %next, "Watcher state change");
            *current = next;
            true
        });
    }

    fn force_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    async fn start(self: Arc<Self>) -> Result<()> {
        if !self.connection.is_ready() {
            tracing::debug!("Connection not ready, not starting");
            return Ok(());
        }

        let mut worker = self.worker.lock().await;
        if let Some(existing) = worker.take() {
            existing.shutdown().await;
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        self.set_state(WatcherState::Opening);

        let token = match self.state_manager.load_token(&self.config.collection).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read resume watermark, watching from the tail");
                None
            }
        };

        let (subscription, attempt) = match self.open(token).await {
            Ok(subscription) => {
                self.set_state(WatcherState::Watching);
                (Some(subscription), 0)
            }
            Err(err) if err.is_fatal() => {
                self.force_stop();
                crate::log_error_with_context!(err, "Collection not found, watcher stopped");
                self.notify_error(err.clone()).await;
                self.set_state(WatcherState::Stopped);
                return Err(err.into());
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to open subscription, retrying");
                self.notify_error(err).await;
                (None, 1)
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(
            self.clone()
                .run(subscription, attempt, shutdown_rx)
                .instrument(self.span.clone()),
        );
        *worker = Some(Worker {
            shutdown: shutdown_tx,
            handle,
        });
        Ok(())
    }

    async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        self.force_stop();
        if let Some(existing) = worker.take() {
            tracing::info!("Stopping watcher");
            existing.shutdown().await;
        }
        self.set_state(WatcherState::Stopped);
    }

    async fn open(
        &self,
        resume_after: Option<ResumeToken>,
    ) -> std::result::Result<Box<dyn Subscription>, FeedError> {
        tracing::debug!(
            resume_after = ?resume_after.as_ref().map(|t| t.to_string()),
            "Opening subscription"
        );
        self.feed
            .subscribe(SubscribeRequest {
                collection: self.config.collection.clone(),
                resume_after,
                options: self.config.watch.clone(),
            })
            .await
    }

    async fn run(
        self: Arc<Self>,
        mut subscription: Option<Box<dyn Subscription>>,
        mut attempt: u32,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if let Some(mut active) = subscription.take() {
                let outcome = self.consume(active.as_mut(), &mut shutdown).await;
                self.set_state(WatcherState::Closing);
                active.close().await;
                match outcome {
                    Outcome::Shutdown | Outcome::Fatal => {
                        self.set_state(WatcherState::Stopped);
                        return;
                    }
                    Outcome::Terminated { delivered } => {
                        if delivered {
                            attempt = 0;
                        }
                    }
                }
            }

            if self.stop_requested.load(Ordering::SeqCst) || *shutdown.borrow() {
                tracing::info!("Stop requested, not restarting");
                self.set_state(WatcherState::Stopped);
                return;
            }
            if !self.connection.is_ready() {
                tracing::info!("Connection not ready, waiting for reconnect");
                self.set_state(WatcherState::Stopped);
                return;
            }

            let delay = self.config.restart.delay(attempt);
            attempt = attempt.saturating_add(1);
            crate::log_restart!(self.config.collection, attempt, delay);
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => {
                        self.set_state(WatcherState::Stopped);
                        return;
                    }
                }
            }

            self.set_state(WatcherState::Opening);
            let token = match self.state_manager.load_token(&self.config.collection).await {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read resume watermark, retrying");
                    // A zero backoff must still let other tasks run
                    tokio::task::yield_now().await;
                    continue;
                }
            };

            match self.open(token).await {
                Ok(reopened) => {
                    self.set_state(WatcherState::Watching);
                    tracing::info!("Subscription reopened");
                    subscription = Some(reopened);
                }
                Err(err) if err.is_fatal() => {
                    self.force_stop();
                    crate::log_error_with_context!(err, "Collection not found, watcher stopped");
                    self.notify_error(err).await;
                    self.set_state(WatcherState::Stopped);
                    return;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to reopen subscription");
                    self.notify_error(err).await;
                }
            }
        }
    }

    async fn consume(
        &self,
        subscription: &mut dyn Subscription,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Outcome {
        let mut delivered = false;
        loop {
            let notification = tokio::select! {
                biased;
                _ = shutdown.changed() => return Outcome::Shutdown,
                notification = subscription.next() => notification,
            };

            match notification {
                Some(FeedNotification::Change(event)) => {
                    delivered = true;
                    self.deliver(event).await;
                }
                Some(FeedNotification::Error(err)) if err.is_fatal() => {
                    self.force_stop();
                    crate::log_error_with_context!(err, "Collection not found, watcher stopped");
                    self.notify_error(err).await;
                    return Outcome::Fatal;
                }
                Some(FeedNotification::Error(err)) => {
                    tracing::warn!(error = %err, "Change feed reported an error");
                    self.notify_error(err).await;
                }
                Some(FeedNotification::End) => {
                    tracing::info!("Change feed ended");
                    if let Some(on_end) = &self.config.handlers.on_end {
                        guard_callback("on_end", async { on_end().await }).await;
                    }
                    return Outcome::Terminated { delivered };
                }
                Some(FeedNotification::Close) | None => {
                    tracing::info!("Change feed closed");
                    if let Some(on_close) = &self.config.handlers.on_close {
                        guard_callback("on_close", async { on_close().await }).await;
                    }
                    return Outcome::Terminated { delivered };
                }
            }
        }
    }

    /// Run the change callback, then checkpoint on success
    async fn deliver(&self, event: ChangeEvent) {
        let Some(on_change) = self.config.handlers.on_change.clone() else {
            tracing::trace!(event_id = %event.id, "No change handler, skipping event");
            return;
        };

        self.set_state(WatcherState::Paused);
        let token = event.id.clone();
        let operation = event.operation;

        let result = AssertUnwindSafe(async move { on_change(event).await })
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => {
                if let Err(e) = self
                    .state_manager
                    .checkpoint(&self.config.collection, &token)
                    .await
                {
                    tracing::error!(
                        event_id = %token,
                        error = %e,
                        "Failed to save resume watermark; event may be redelivered"
                    );
                }
            }
            Ok(Err(e)) => {
                tracing::error!(
                    event_id = %token,
                    operation = %operation,
                    error = %format!("{e:#}"),
                    "Change handler failed, watermark not advanced"
                );
            }
            Err(_) => {
                tracing::error!(
                    event_id = %token,
                    operation = %operation,
                    "Change handler panicked, watermark not advanced"
                );
            }
        }

        self.state.send_if_modified(|current| {
            if *current == WatcherState::Paused {
                *current = WatcherState::Watching;
                return true;
            }
            false
        });
    }

    async fn notify_error(&self, err: FeedError) {
        if let Some(on_error) = &self.config.handlers.on_error {
            guard_callback("on_error", async move { on_error(err).await }).await;
        }
    }
}

/// Await a lifecycle callback; a panic is logged and does not unwind the worker
async fn guard_callback<F>(name: &'static str, callback: F)
where
    F: std::future::Future<Output = ()>,
{
    if AssertUnwindSafe(callback).catch_unwind().await.is_err() {
        tracing::error!(callback = name, "Watch callback panicked, continuing");
    }
}
