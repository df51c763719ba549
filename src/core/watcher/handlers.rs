//! Watch handler callbacks
//!
//! Every callback is optional. Without an `on_change` callback events are
//! skipped and the watermark never advances.

use crate::domain::errors::FeedError;
use crate::domain::event::ChangeEvent;
use crate::handlers::ChangeHandler;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Callback invoked for every change event
pub type ChangeCallback =
    Arc<dyn Fn(ChangeEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Callback invoked for subscription errors
pub type ErrorCallback = Arc<dyn Fn(FeedError) -> BoxFuture<'static, ()> + Send + Sync>;

/// Callback invoked when a subscription ends or closes
pub type LifecycleCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Set of callbacks attached to a watcher
///
/// # Examples
///
/// ```
/// use tidemark::core::watcher::WatchHandlers;
///
/// let handlers = WatchHandlers::new()
///     .on_change(|event| async move {
///         println!("{}: {}", event.operation, event.payload);
///         Ok(())
///     })
///     .on_close(|| async { println!("stream is closed") });
///
/// assert!(handlers.has_change_handler());
/// ```
#[derive(Clone, Default)]
pub struct WatchHandlers {
    pub(crate) on_change: Option<ChangeCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) on_close: Option<LifecycleCallback>,
    pub(crate) on_end: Option<LifecycleCallback>,
}

impl WatchHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the change callback
    ///
    /// Returning an error leaves the watermark where it was; the event will
    /// be delivered again after the next restart unless a later event is
    /// checkpointed first.
    pub fn on_change<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ChangeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_change = Some(Arc::new(move |event| Box::pin(f(event))));
        self
    }

    /// Use a [`ChangeHandler`] implementation as the change callback
    pub fn with_change_handler(mut self, handler: Arc<dyn ChangeHandler>) -> Self {
        self.on_change = Some(Arc::new(move |event| {
            let handler = handler.clone();
            Box::pin(async move { handler.handle(&event).await })
        }));
        self
    }

    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(FeedError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |err| Box::pin(f(err))));
        self
    }

    pub fn on_close<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_close = Some(Arc::new(move || Box::pin(f())));
        self
    }

    pub fn on_end<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_end = Some(Arc::new(move || Box::pin(f())));
        self
    }

    pub fn has_change_handler(&self) -> bool {
        self.on_change.is_some()
    }
}

impl fmt::Debug for WatchHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandlers")
            .field("on_change", &self.on_change.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}
