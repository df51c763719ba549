//! Connection liveness and leadership abstractions
//!
//! Both sources publish their events on a `tokio::sync::broadcast` channel.
//! A subscriber stays registered for as long as it holds its receiver;
//! dropping the receiver is the deregistration.

use crate::domain::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Connection liveness notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

/// Leadership notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadershipEvent {
    /// This process is now the leader
    Elected,
    /// This process lost leadership
    Revoked,
}

/// Connection to the backend that hosts the change feed
#[async_trait]
pub trait Connection: Send + Sync {
    /// Whether the connection is currently usable
    fn is_ready(&self) -> bool;

    /// Subscribe to connected/disconnected transitions
    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent>;

    /// Release the connection
    async fn close(&self) -> Result<()>;
}

/// External leadership election
///
/// At most one cooperating process is elected at a time; that guarantee is
/// provided by the implementation, not by the watcher.
#[async_trait]
pub trait LeadershipSource: Send + Sync {
    /// Whether this process currently holds leadership
    fn is_leader(&self) -> bool;

    /// Subscribe to elected/revoked transitions
    fn subscribe(&self) -> broadcast::Receiver<LeadershipEvent>;

    /// Give up leadership and stop campaigning
    async fn resign(&self) -> Result<()>;
}
