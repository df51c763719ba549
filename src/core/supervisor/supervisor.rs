//! Leadership-gated supervisor
//!
//! Runs a set of watchers only while this process holds leadership and the
//! connection is up. Elected starts every watcher, revoked or disconnected
//! stops them, a reconnect brings back the ones that were running when the
//! connection dropped.

use crate::adapters::cluster::traits::{
    Connection, ConnectionEvent, LeadershipEvent, LeadershipSource,
};
use crate::core::watcher::{ChangeFeedWatcher, WatcherState};
use crate::domain::ids::CollectionName;
use crate::domain::Result;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

/// Coordinates watchers with leadership and connection liveness
pub struct Supervisor {
    watchers: Vec<ChangeFeedWatcher>,
    leadership: Arc<dyn LeadershipSource>,
    connection: Arc<dyn Connection>,
    recheck_on_reconnect: bool,
    /// Per watcher: should run once the connection is up
    wanted: Vec<AtomicBool>,
    disconnected: AtomicBool,
    shut_down: AtomicBool,
}

impl Supervisor {
    /// Create a supervisor
    ///
    /// # Arguments
    ///
    /// * `watchers` - Watchers to manage; none is started until elected
    /// * `leadership` - Leadership source gating the watchers
    /// * `connection` - Connection whose liveness stops and restarts them
    pub fn new(
        watchers: Vec<ChangeFeedWatcher>,
        leadership: Arc<dyn LeadershipSource>,
        connection: Arc<dyn Connection>,
    ) -> Self {
        let wanted = watchers.iter().map(|_| AtomicBool::new(false)).collect();
        Self {
            watchers,
            wanted,
            disconnected: AtomicBool::new(false),
            leadership,
            connection,
            recheck_on_reconnect: true,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Whether a reconnect restarts watchers only while still leader
    ///
    /// Enabled by default. Disabling it restarts watchers on every reconnect
    /// regardless of leadership. Either way only watchers that were running
    /// when the connection dropped come back.
    pub fn with_recheck_on_reconnect(mut self, recheck: bool) -> Self {
        self.recheck_on_reconnect = recheck;
        self
    }

    pub fn watchers(&self) -> &[ChangeFeedWatcher] {
        &self.watchers
    }

    /// Current state of every watcher
    pub fn states(&self) -> Vec<(CollectionName, WatcherState)> {
        self.watchers
            .iter()
            .map(|w| (w.collection().clone(), w.state()))
            .collect()
    }

    /// Start every watcher concurrently
    ///
    /// A watcher that fails to start is logged and does not affect the others.
    pub async fn on_elected(&self) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        tracing::info!(watchers = self.watchers.len(), "Elected leader, starting watchers");
        self.mark_all_wanted(true);
        self.start_wanted().await;
    }

    /// Stop every watcher concurrently
    pub async fn on_revoked(&self) {
        tracing::info!("Leadership revoked, stopping watchers");
        self.mark_all_wanted(false);
        self.stop_all().await;
    }

    /// Stop every watcher; a later reconnect restarts the ones that were running
    ///
    /// A watcher already stopped for good, e.g. after its collection vanished,
    /// is not brought back by the reconnect.
    pub async fn on_disconnected(&self) {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            for (watcher, wanted) in self.watchers.iter().zip(&self.wanted) {
                if watcher.is_stop_requested() {
                    wanted.store(false, Ordering::SeqCst);
                }
            }
        }
        tracing::warn!("Connection lost, stopping watchers");
        self.stop_all().await;
    }

    /// Restart the watchers that were running before the connection dropped
    pub async fn on_connected(&self) {
        self.disconnected.store(false, Ordering::SeqCst);
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        if self.recheck_on_reconnect && !self.leadership.is_leader() {
            tracing::info!("Reconnected but not leader, watchers stay stopped");
            return;
        }
        tracing::info!("Reconnected, restarting watchers");
        self.start_wanted().await;
    }

    /// Stop every watcher, give up leadership, then close the connection
    ///
    /// # Errors
    ///
    /// Returns an error if closing the connection fails. A failed resign is
    /// only logged.
    pub async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Shutting down supervisor");
        self.stop_all().await;

        if let Err(e) = self.leadership.resign().await {
            tracing::warn!(error = %e, "Failed to resign leadership");
        }

        self.connection.close().await?;
        tracing::info!("Connection closed");
        Ok(())
    }

    /// Drive the supervisor until `shutdown` flips to `true`, then shut down
    ///
    /// Starts the watchers right away if this process already leads.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut leadership_events = self.leadership.subscribe();
        let mut connection_events = self.connection.subscribe();

        if self.leadership.is_leader() {
            self.on_elected().await;
        }

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = leadership_events.recv() => match event {
                    Ok(LeadershipEvent::Elected) => self.on_elected().await,
                    Ok(LeadershipEvent::Revoked) => self.on_revoked().await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Missed leadership events, reconciling");
                        if self.leadership.is_leader() {
                            self.on_elected().await;
                        } else {
                            self.on_revoked().await;
                        }
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("Leadership source closed");
                        break;
                    }
                },
                event = connection_events.recv() => match event {
                    Ok(ConnectionEvent::Connected) => self.on_connected().await,
                    Ok(ConnectionEvent::Disconnected) => self.on_disconnected().await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Missed connection events, reconciling");
                        if self.connection.is_ready() {
                            self.on_connected().await;
                        } else {
                            self.on_disconnected().await;
                        }
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("Connection event source closed");
                        break;
                    }
                },
            }
        }

        self.shutdown().await
    }

    fn mark_all_wanted(&self, wanted: bool) {
        for flag in &self.wanted {
            flag.store(wanted, Ordering::SeqCst);
        }
    }

    async fn start_wanted(&self) {
        let wanted: Vec<&ChangeFeedWatcher> = self
            .watchers
            .iter()
            .zip(&self.wanted)
            .filter(|(_, wanted)| wanted.load(Ordering::SeqCst))
            .map(|(watcher, _)| watcher)
            .collect();
        let results = join_all(wanted.iter().map(|w| w.start())).await;
        for (watcher, result) in wanted.into_iter().zip(results) {
            if let Err(e) = result {
                tracing::error!(
                    collection = %watcher.collection(),
                    error = %e,
                    "Failed to start watcher"
                );
            }
        }
    }

    async fn stop_all(&self) {
        join_all(self.watchers.iter().map(|w| w.stop())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryChangeFeed, InMemoryWatermarkStore, ManualConnection, ManualLeadership,
    };
    use crate::core::state::StateManager;
    use crate::core::watcher::{RestartPolicy, WatcherConfig};

    fn supervisor(
        names: &[&str],
        leadership: Arc<ManualLeadership>,
        connection: Arc<ManualConnection>,
    ) -> Supervisor {
        let feed = Arc::new(InMemoryChangeFeed::new());
        let state = StateManager::new_with_store(Arc::new(InMemoryWatermarkStore::new()));
        let watchers = names
            .iter()
            .map(|name| {
                ChangeFeedWatcher::new(
                    WatcherConfig::new(CollectionName::new(*name).unwrap())
                        .with_restart_policy(RestartPolicy::immediate()),
                    feed.clone(),
                    connection.clone(),
                    state.clone(),
                )
            })
            .collect();
        Supervisor::new(watchers, leadership, connection)
    }

    #[tokio::test]
    async fn test_elected_then_revoked() {
        let leadership = Arc::new(ManualLeadership::new());
        let connection = Arc::new(ManualConnection::new());
        let sup = supervisor(&["orders", "payments"], leadership, connection);

        sup.on_elected().await;
        assert!(sup.states().iter().all(|(_, s)| *s == WatcherState::Watching));

        sup.on_revoked().await;
        assert!(sup.states().iter().all(|(_, s)| *s == WatcherState::Stopped));
    }

    #[tokio::test]
    async fn test_reconnect_as_follower_keeps_watchers_stopped() {
        let leadership = Arc::new(ManualLeadership::new());
        let connection = Arc::new(ManualConnection::new());
        let sup = supervisor(&["orders"], leadership.clone(), connection.clone());

        leadership.elect();
        sup.on_elected().await;
        connection.disconnect();
        sup.on_disconnected().await;
        leadership.set_silently(false);

        connection.connect();
        sup.on_connected().await;
        assert_eq!(sup.states()[0].1, WatcherState::Stopped);
    }

    #[tokio::test]
    async fn test_reconnect_never_starts_unelected_watchers() {
        let leadership = Arc::new(ManualLeadership::new());
        let connection = Arc::new(ManualConnection::new());
        let sup = supervisor(&["orders", "payments"], leadership, connection.clone())
            .with_recheck_on_reconnect(false);

        connection.disconnect();
        sup.on_disconnected().await;
        connection.connect();
        sup.on_connected().await;

        assert!(sup.states().iter().all(|(_, s)| *s == WatcherState::Idle));
    }

    #[tokio::test]
    async fn test_reconnect_after_revocation_keeps_watchers_stopped() {
        let leadership = Arc::new(ManualLeadership::new());
        let connection = Arc::new(ManualConnection::new());
        let sup = supervisor(&["orders"], leadership, connection.clone())
            .with_recheck_on_reconnect(false);

        sup.on_elected().await;
        sup.on_revoked().await;
        connection.disconnect();
        sup.on_disconnected().await;
        connection.connect();
        sup.on_connected().await;

        assert_eq!(sup.states()[0].1, WatcherState::Stopped);
    }

    #[tokio::test]
    async fn test_election_during_outage_starts_on_reconnect() {
        let leadership = Arc::new(ManualLeadership::new());
        let connection = Arc::new(ManualConnection::new());
        let sup = supervisor(&["orders"], leadership.clone(), connection.clone());

        connection.disconnect();
        sup.on_disconnected().await;
        leadership.elect();
        sup.on_elected().await;
        assert_eq!(sup.states()[0].1, WatcherState::Idle);

        // A repeated disconnect must not forget the election
        sup.on_disconnected().await;
        connection.connect();
        sup.on_connected().await;
        assert_eq!(sup.states()[0].1, WatcherState::Watching);
    }

    #[tokio::test]
    async fn test_shutdown_closes_connection_once() {
        let leadership = Arc::new(ManualLeadership::new());
        let connection = Arc::new(ManualConnection::new());
        let sup = supervisor(&["orders"], leadership, connection.clone());

        sup.on_elected().await;
        sup.shutdown().await.unwrap();
        sup.shutdown().await.unwrap();

        assert!(connection.is_closed());
        assert_eq!(sup.states()[0].1, WatcherState::Stopped);
    }
}
