//! Backend factory
//!
//! Builds the PostgreSQL-backed implementation of every port from
//! configuration. All of them share one connection pool.

use crate::adapters::cluster::{Connection, LeadershipSource, StaticLeadership};
use crate::adapters::database::traits::WatermarkStore;
use crate::adapters::feed::ChangeFeed;
use crate::adapters::postgresql::{
    LeaseOptions, PostgreSQLChangeFeed, PostgreSQLClient, PostgreSQLConnection,
    PostgreSQLLeaderLease, PostgreSQLWatermarkStore, TableNames,
};
use crate::config::schema::TidemarkConfig;
use crate::domain::Result;
use std::sync::Arc;
use std::time::Duration;

/// Every backend component a running consumer needs
pub struct Backend {
    pub client: Arc<PostgreSQLClient>,
    pub store: Arc<dyn WatermarkStore>,
    pub feed: Arc<dyn ChangeFeed>,
    pub connection: Arc<dyn Connection>,
    pub leadership: Arc<dyn LeadershipSource>,
}

/// Create the shared PostgreSQL client
///
/// # Errors
///
/// Returns an error if the connection string or pool settings are invalid
pub fn create_client(config: &TidemarkConfig) -> Result<Arc<PostgreSQLClient>> {
    tracing::info!("Creating PostgreSQL client");
    Ok(Arc::new(PostgreSQLClient::new(config.postgresql.clone())?))
}

/// Create the watermark store
pub fn create_watermark_store(
    config: &TidemarkConfig,
    client: Arc<PostgreSQLClient>,
) -> Arc<dyn WatermarkStore> {
    Arc::new(PostgreSQLWatermarkStore::new(
        client,
        config.feed.resume_token_table.clone(),
    ))
}

/// Create the change feed
pub fn create_change_feed(
    config: &TidemarkConfig,
    client: Arc<PostgreSQLClient>,
) -> Arc<dyn ChangeFeed> {
    Arc::new(PostgreSQLChangeFeed::new(
        client,
        config.feed.events_table.clone(),
        Duration::from_millis(config.feed.poll_interval_ms),
        config.feed.batch_size,
    ))
}

/// Create the leadership source
///
/// With leadership disabled this process leads unconditionally. Otherwise
/// a lease campaign is started before returning.
pub async fn create_leadership(
    config: &TidemarkConfig,
    client: Arc<PostgreSQLClient>,
) -> Arc<dyn LeadershipSource> {
    if !config.leadership.enabled {
        tracing::info!("Leader election disabled, running as sole leader");
        return Arc::new(StaticLeadership::new());
    }

    let lease = PostgreSQLLeaderLease::new(
        client,
        LeaseOptions {
            table: TableNames::default().leases,
            group: config.leadership.group.clone(),
            ttl: Duration::from_millis(config.leadership.ttl_ms),
            wait: Duration::from_millis(config.leadership.wait_ms),
        },
    );
    lease.start().await;
    lease
}

/// Build every backend component, creating the schema first
///
/// # Errors
///
/// Returns an error if the client cannot be created or the schema cannot be
/// ensured on a reachable database.
pub async fn create_backend(config: &TidemarkConfig) -> Result<Backend> {
    let client = create_client(config)?;
    client
        .ensure_schema(&TableNames::from_config(&config.feed))
        .await?;

    let connection = PostgreSQLConnection::connect(
        client.clone(),
        Duration::from_millis(config.connection.health_check_interval_ms),
    )
    .await;

    Ok(Backend {
        store: create_watermark_store(config, client.clone()),
        feed: create_change_feed(config, client.clone()),
        leadership: create_leadership(config, client.clone()).await,
        connection,
        client,
    })
}
