//! PostgreSQL client implementation
//!
//! Pooled access shared by the watermark store, the change feed, the
//! health monitor and the leader lease.

use crate::adapters::postgresql::schema::{initial_schema, TableNames};
use crate::config::schema::PostgreSQLConfig;
use crate::config::redacted_connection_string;
use crate::domain::{Result, TidemarkError};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};

/// PostgreSQL client for Tidemark
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// No connection is opened until the first query.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the connection string cannot be
    /// parsed or the pool cannot be built.
    pub fn new(config: PostgreSQLConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_ref()
            .parse()
            .map_err(|e| {
                TidemarkError::Configuration(format!(
                    "Invalid PostgreSQL connection string: {}",
                    e
                ))
            })?;

        pg_config.options(&format!(
            "-c statement_timeout={}",
            config.statement_timeout_seconds * 1000
        ));
        pg_config.application_name("tidemark");

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .build()
            .map_err(|e| {
                TidemarkError::Configuration(format!("Failed to create connection pool: {}", e))
            })?;

        Ok(Self { pool, config })
    }

    /// Get a connection from the pool and run `SELECT 1`
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| map_db_error("Connection test failed", e))?;
        Ok(())
    }

    /// Create the tables used by Tidemark if they do not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn ensure_schema(&self, tables: &TableNames) -> Result<()> {
        let client = self.get_connection().await?;
        client
            .batch_execute(&initial_schema(tables))
            .await
            .map_err(|e| map_db_error("Failed to create schema", e))?;

        tracing::info!(
            events_table = %tables.events,
            resume_token_table = %tables.resume_tokens,
            lease_table = %tables.leases,
            "PostgreSQL schema ready"
        );
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// Returns a `Database` error if no connection can be obtained.
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            TidemarkError::database(format!("Failed to get connection from pool: {}", e))
        })
    }

    /// Execute a query and return rows
    ///
    /// # Errors
    ///
    /// Returns a `Database` error carrying the server's SQLSTATE if any.
    pub async fn query(
        &self,
        query: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Row>> {
        let client = self.get_connection().await?;
        let statement = client
            .prepare_cached(query)
            .await
            .map_err(|e| map_db_error("Failed to prepare query", e))?;
        client
            .query(&statement, params)
            .await
            .map_err(|e| map_db_error("Query failed", e))
    }

    /// Execute a statement and return the number of affected rows
    pub async fn execute(
        &self,
        statement: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<u64> {
        let client = self.get_connection().await?;
        let prepared = client
            .prepare_cached(statement)
            .await
            .map_err(|e| map_db_error("Failed to prepare statement", e))?;
        client
            .execute(&prepared, params)
            .await
            .map_err(|e| map_db_error("Statement execution failed", e))
    }

    /// Connection string with the password masked
    pub fn connection_string_safe(&self) -> String {
        redacted_connection_string(&self.config.connection_string)
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }

    /// Close the pool; later `get_connection` calls fail
    pub fn close(&self) {
        self.pool.close();
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Wrap a driver error, keeping the server's SQLSTATE
pub(crate) fn map_db_error(context: &str, err: tokio_postgres::Error) -> TidemarkError {
    TidemarkError::Database {
        message: format!("{}: {}", context, err),
        sqlstate: err.code().map(|code| code.code().to_string()),
    }
}
