//! PostgreSQL connection liveness
//!
//! Probes the pool with `SELECT 1` at a fixed interval and publishes
//! `Connected`/`Disconnected` whenever the outcome flips.

use crate::adapters::cluster::traits::{Connection, ConnectionEvent};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::domain::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 16;

/// Health-checked PostgreSQL connection
pub struct PostgreSQLConnection {
    client: Arc<PostgreSQLClient>,
    ready: AtomicBool,
    closed: AtomicBool,
    events: broadcast::Sender<ConnectionEvent>,
    interval: Duration,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl PostgreSQLConnection {
    /// Probe once, then keep probing every `interval` in the background
    ///
    /// The returned connection may start out not ready; the first
    /// successful probe publishes `Connected`.
    pub async fn connect(client: Arc<PostgreSQLClient>, interval: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let connection = Arc::new(Self {
            client,
            ready: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            events,
            interval,
            monitor: Mutex::new(None),
        });

        connection.probe().await;

        let handle = tokio::spawn(monitor(Arc::downgrade(&connection), interval));
        *connection.monitor.lock().await = Some(handle);
        connection
    }

    /// Run one health probe and publish a transition if the state changed
    ///
    /// # Returns
    ///
    /// Whether the connection is ready after the probe
    pub async fn probe(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }

        match self.client.test_connection().await {
            Ok(()) => {
                if !self.ready.swap(true, Ordering::SeqCst) {
                    tracing::info!(
                        database = %self.client.connection_string_safe(),
                        "PostgreSQL connected"
                    );
                    let _ = self.events.send(ConnectionEvent::Connected);
                }
                true
            }
            Err(e) => {
                if self.ready.swap(false, Ordering::SeqCst) {
                    tracing::warn!(error = %e, "PostgreSQL connection lost");
                    let _ = self.events.send(ConnectionEvent::Disconnected);
                } else {
                    tracing::debug!(error = %e, "PostgreSQL still unreachable");
                }
                false
            }
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

async fn monitor(connection: Weak<PostgreSQLConnection>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let Some(connection) = connection.upgrade() else {
            return;
        };
        if connection.closed.load(Ordering::SeqCst) {
            return;
        }
        connection.probe().await;
    }
}

#[async_trait]
impl Connection for PostgreSQLConnection {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(handle) = self.monitor.lock().await.take() {
            handle.abort();
        }
        self.ready.store(false, Ordering::SeqCst);
        self.client.close();
        tracing::info!("PostgreSQL pool closed");
        Ok(())
    }
}

impl Drop for PostgreSQLConnection {
    fn drop(&mut self) {
        if let Ok(mut monitor) = self.monitor.try_lock() {
            if let Some(handle) = monitor.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PostgreSQLConfig;
    use crate::config::secret_string;

    fn closed_client() -> Arc<PostgreSQLClient> {
        let client = PostgreSQLClient::new(PostgreSQLConfig {
            connection_string: secret_string("postgresql://localhost/db".to_string()),
            max_connections: 1,
            connection_timeout_seconds: 1,
            statement_timeout_seconds: 1,
        })
        .unwrap();
        client.close();
        Arc::new(client)
    }

    #[tokio::test]
    async fn test_unreachable_database_is_not_ready() {
        let connection =
            PostgreSQLConnection::connect(closed_client(), Duration::from_secs(60)).await;
        assert!(!connection.is_ready());
        assert!(!connection.probe().await);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let connection =
            PostgreSQLConnection::connect(closed_client(), Duration::from_secs(60)).await;
        connection.close().await.unwrap();
        connection.close().await.unwrap();
        assert!(!connection.is_ready());
        assert!(!connection.probe().await);
    }
}
