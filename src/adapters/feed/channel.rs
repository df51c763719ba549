//! Subscription fed by a background producer task

use crate::adapters::feed::traits::{FeedNotification, Subscription};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Subscription reading from a single-slot channel filled by `task`
///
/// Closing or dropping it aborts the producer.
pub struct ChannelSubscription {
    rx: mpsc::Receiver<FeedNotification>,
    task: JoinHandle<()>,
}

impl ChannelSubscription {
    /// Spawn `producer` with the sending half of a one-slot channel
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(mpsc::Sender<FeedNotification>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        // Single slot: at most one event waits while the consumer is busy.
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(producer(tx));
        Self { rx, task }
    }
}

#[async_trait]
impl Subscription for ChannelSubscription {
    async fn next(&mut self) -> Option<FeedNotification> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.rx.close();
        self.task.abort();
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_producer_blocks_until_consumed() {
        let mut sub = ChannelSubscription::spawn(|tx| async move {
            for _ in 0..3 {
                if tx.send(FeedNotification::End).await.is_err() {
                    return;
                }
            }
        });

        assert_eq!(sub.next().await, Some(FeedNotification::End));
        assert_eq!(sub.next().await, Some(FeedNotification::End));
        assert_eq!(sub.next().await, Some(FeedNotification::End));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_close_stops_producer() {
        let mut sub = ChannelSubscription::spawn(|tx| async move {
            let _ = tx.send(FeedNotification::Close).await;
            std::future::pending::<()>().await;
        });
        sub.close().await;
        assert!((&mut sub.task).await.unwrap_err().is_cancelled());
    }
}
