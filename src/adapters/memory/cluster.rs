//! Manually driven connection and leadership sources
//!
//! Both publish transitions only when their state actually changes, so
//! calling `elect()` twice emits a single `Elected`.

use crate::adapters::cluster::traits::{
    Connection, ConnectionEvent, LeadershipEvent, LeadershipSource,
};
use crate::domain::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

/// Connection whose liveness is set by the caller
pub struct ManualConnection {
    ready: AtomicBool,
    closed: AtomicBool,
    events: broadcast::Sender<ConnectionEvent>,
}

impl ManualConnection {
    /// A connection that starts out ready
    pub fn new() -> Self {
        Self::with_state(true)
    }

    /// A connection that starts out disconnected
    pub fn disconnected() -> Self {
        Self::with_state(false)
    }

    fn with_state(ready: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            ready: AtomicBool::new(ready),
            closed: AtomicBool::new(false),
            events,
        }
    }

    pub fn connect(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(ConnectionEvent::Connected);
        }
    }

    pub fn disconnect(&self) {
        if self.ready.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(ConnectionEvent::Disconnected);
        }
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for ManualConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for ManualConnection {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && !self.is_closed()
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Leadership source whose status is set by the caller
pub struct ManualLeadership {
    leader: AtomicBool,
    events: broadcast::Sender<LeadershipEvent>,
}

impl ManualLeadership {
    /// Starts out as a follower
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            leader: AtomicBool::new(false),
            events,
        }
    }

    pub fn elect(&self) {
        if !self.leader.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(LeadershipEvent::Elected);
        }
    }

    pub fn revoke(&self) {
        if self.leader.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(LeadershipEvent::Revoked);
        }
    }

    /// Change leadership without notifying subscribers
    ///
    /// Models a lease that lapsed while the process could not hear about it.
    pub fn set_silently(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }
}

impl Default for ManualLeadership {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadershipSource for ManualLeadership {
    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<LeadershipEvent> {
        self.events.subscribe()
    }

    async fn resign(&self) -> Result<()> {
        self.revoke();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_emits_only_transitions() {
        let connection = ManualConnection::new();
        let mut events = connection.subscribe();

        connection.connect();
        connection.disconnect();
        connection.disconnect();
        connection.connect();

        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Disconnected);
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_connection_is_not_ready() {
        let connection = ManualConnection::new();
        connection.close().await.unwrap();
        assert!(!connection.is_ready());
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_leadership_transitions() {
        let leadership = ManualLeadership::new();
        let mut events = leadership.subscribe();

        leadership.elect();
        leadership.elect();
        assert!(leadership.is_leader());
        leadership.resign().await.unwrap();
        assert!(!leadership.is_leader());

        assert_eq!(events.recv().await.unwrap(), LeadershipEvent::Elected);
        assert_eq!(events.recv().await.unwrap(), LeadershipEvent::Revoked);
        assert!(events.try_recv().is_err());
    }
}
