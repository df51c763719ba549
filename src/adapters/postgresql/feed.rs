//! PostgreSQL change feed
//!
//! Reads an append-only events table (an outbox) by polling for rows past
//! the subscription's cursor. Each subscription runs one polling task that
//! hands rows over through a single-slot channel, so it never reads further
//! ahead than one batch while the consumer is busy.
//!
//! Sequence ids are handed out at insert time but rows become visible at
//! commit, so scanning by id alone would step over a row whose transaction
//! commits after a later id was read. Every row therefore records the id of
//! the transaction that wrote it (`txid`, defaulted from
//! `pg_current_xact_id()`, PostgreSQL 13+). Rows are read in `(txid, id)`
//! order and only once `txid` is below the snapshot's `xmin`, i.e. once
//! every transaction that could still add an earlier row has finished. The
//! resume token is that `(txid, id)` pair.
//!
//! A subscription without a token starts at the current horizon. Rows of
//! transactions still running at that moment are delivered once they
//! commit. A long-running transaction anywhere in the cluster holds the
//! horizon back and delays delivery until it ends.
//!
//! A missing events table (or database) is reported as
//! `FeedError::NamespaceNotFound`. Any other query failure is reported as a
//! transient error followed by `Close`, which makes the watcher reopen from
//! its watermark. An `invalidate` event ends the subscription.

use crate::adapters::feed::channel::ChannelSubscription;
use crate::adapters::feed::traits::{
    ChangeFeed, FeedNotification, SubscribeRequest, Subscription, WatchOptions,
};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{FeedPosition, PostgreSQLChangeEvent};
use crate::adapters::postgresql::schema::{INVALID_CATALOG_NAME, UNDEFINED_TABLE};
use crate::domain::errors::FeedError;
use crate::domain::event::OperationType;
use crate::domain::ids::CollectionName;
use crate::domain::TidemarkError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Change feed polling a PostgreSQL events table
#[derive(Clone)]
pub struct PostgreSQLChangeFeed {
    client: Arc<PostgreSQLClient>,
    table: String,
    poll_interval: Duration,
    batch_size: i64,
}

impl PostgreSQLChangeFeed {
    /// Create a feed over `table`
    ///
    /// # Arguments
    ///
    /// * `client` - Shared PostgreSQL client
    /// * `table` - Validated events table name
    /// * `poll_interval` - Wait between polls that returned nothing
    /// * `batch_size` - Maximum rows fetched per poll
    pub fn new(
        client: Arc<PostgreSQLClient>,
        table: impl Into<String>,
        poll_interval: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            poll_interval,
            batch_size: batch_size.max(1) as i64,
        }
    }

    /// Position just before every transaction that has not finished yet
    ///
    /// The events table is queried so a missing table surfaces here.
    async fn tail_position(&self) -> Result<FeedPosition, TidemarkError> {
        let rows = self.client.query(&tail_sql(&self.table), &[]).await?;
        let xmin = rows
            .first()
            .map(|row| row.try_get::<_, i64>("xmin"))
            .transpose()
            .map_err(|e| TidemarkError::Serialization(e.to_string()))?
            .ok_or_else(|| TidemarkError::database("horizon query returned no row"))?;
        Ok(horizon_cursor(xmin))
    }

    async fn fetch_after(
        &self,
        collection: &CollectionName,
        cursor: FeedPosition,
    ) -> Result<Vec<PostgreSQLChangeEvent>, TidemarkError> {
        let rows = self
            .client
            .query(
                &fetch_sql(&self.table),
                &[
                    &collection.as_str(),
                    &cursor.txid,
                    &cursor.id,
                    &self.batch_size,
                ],
            )
            .await?;
        rows.iter().map(PostgreSQLChangeEvent::from_row).collect()
    }

    fn classify(&self, collection: &CollectionName, err: TidemarkError) -> FeedError {
        match err.sqlstate() {
            Some(UNDEFINED_TABLE) | Some(INVALID_CATALOG_NAME) => FeedError::NamespaceNotFound(
                format!("{} (events table '{}')", collection, self.table),
            ),
            _ => FeedError::Transient(err.to_string()),
        }
    }
}

#[async_trait]
impl ChangeFeed for PostgreSQLChangeFeed {
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> std::result::Result<Box<dyn Subscription>, FeedError> {
        let cursor = match &request.resume_after {
            Some(token) => FeedPosition::from_token(token).ok_or_else(|| {
                FeedError::InvalidResumeToken(format!(
                    "expected {{\"txid\", \"id\"}} position, got {token}"
                ))
            })?,
            None => self
                .tail_position()
                .await
                .map_err(|e| match self.classify(&request.collection, e) {
                    FeedError::Transient(message) => FeedError::OpenFailed(message),
                    other => other,
                })?,
        };

        tracing::debug!(
            collection = %request.collection,
            txid = cursor.txid,
            id = cursor.id,
            table = %self.table,
            "Subscription opened"
        );

        let feed = self.clone();
        Ok(Box::new(ChannelSubscription::spawn(move |tx| {
            feed.poll(request.collection, cursor, request.options, tx)
        })))
    }
}

impl PostgreSQLChangeFeed {
    async fn poll(
        self,
        collection: CollectionName,
        mut cursor: FeedPosition,
        options: WatchOptions,
        tx: mpsc::Sender<FeedNotification>,
    ) {
        loop {
            let rows = match self.fetch_after(&collection, cursor).await {
                Ok(rows) => rows,
                Err(e) => {
                    let err = self.classify(&collection, e);
                    let fatal = err.is_fatal();
                    if tx.send(FeedNotification::Error(err)).await.is_err() || fatal {
                        return;
                    }
                    let _ = tx.send(FeedNotification::Close).await;
                    return;
                }
            };

            if rows.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = tx.closed() => return,
                }
                continue;
            }

            for row in rows {
                cursor = row.position();
                let event = match row.to_domain() {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(event_id = row.id, error = %e, "Skipping malformed event row");
                        let notification =
                            FeedNotification::Error(FeedError::Transient(e.to_string()));
                        if tx.send(notification).await.is_err() {
                            return;
                        }
                        continue;
                    }
                };

                let invalidated = event.operation == OperationType::Invalidate;
                if options.accepts(&event.operation)
                    && tx.send(FeedNotification::Change(event)).await.is_err()
                {
                    return;
                }
                if invalidated {
                    let _ = tx.send(FeedNotification::End).await;
                    return;
                }
            }
        }
    }
}

/// Rows after `($2, $3)` whose writing transaction is below the horizon
fn fetch_sql(table: &str) -> String {
    format!(
        r#"
        SELECT txid, id, collection_name, operation, document_key, payload, cluster_time
        FROM {table}
        WHERE collection_name = $1
          AND (txid, id) > ($2, $3)
          AND txid < pg_snapshot_xmin(pg_current_snapshot())::text::bigint
        ORDER BY txid, id
        LIMIT $4
        "#
    )
}

fn tail_sql(table: &str) -> String {
    format!(
        "SELECT pg_snapshot_xmin(pg_current_snapshot())::text::bigint AS xmin, \
         EXISTS (SELECT 1 FROM {table}) AS present"
    )
}

/// Cursor that skips every finished transaction and nothing else
fn horizon_cursor(xmin: i64) -> FeedPosition {
    FeedPosition {
        txid: xmin - 1,
        id: i64::MAX,
    }
}
