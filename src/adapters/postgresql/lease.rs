//! Lease-based leader election on PostgreSQL
//!
//! Every process in a group campaigns for a single row of the lease table.
//! A holder renews its lease every `wait`; the lease lapses `ttl` after the
//! last renewal. Anyone may take over a lapsed lease. A holder that cannot
//! renew for a whole `ttl` considers itself revoked even without hearing
//! from the database, so two processes never both believe they lead for
//! longer than the clock skew between them. Each attempt is cut off once
//! the held lease could have lapsed, since a partitioned connection may
//! never return.

use crate::adapters::cluster::traits::{LeadershipEvent, LeadershipSource};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::domain::{Result, TidemarkError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 16;

/// Lease settings
#[derive(Debug, Clone)]
pub struct LeaseOptions {
    /// Lease table (validated identifier)
    pub table: String,
    /// Competing processes share a group
    pub group: String,
    /// Lease lifetime after each renewal
    pub ttl: Duration,
    /// Interval between renewals and acquisition attempts
    pub wait: Duration,
}

/// Leadership source backed by a lease row
pub struct PostgreSQLLeaderLease {
    client: Arc<PostgreSQLClient>,
    options: LeaseOptions,
    holder_id: String,
    leader: AtomicBool,
    events: broadcast::Sender<LeadershipEvent>,
    campaign: Mutex<Option<JoinHandle<()>>>,
}

impl PostgreSQLLeaderLease {
    pub fn new(client: Arc<PostgreSQLClient>, options: LeaseOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            client,
            options,
            holder_id: uuid::Uuid::new_v4().to_string(),
            leader: AtomicBool::new(false),
            events,
            campaign: Mutex::new(None),
        })
    }

    /// Unique id this process writes into the lease row
    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Start campaigning in the background
    ///
    /// Calling it again while a campaign runs has no effect.
    pub async fn start(self: &Arc<Self>) {
        let mut campaign = self.campaign.lock().await;
        if campaign.is_some() {
            return;
        }
        tracing::info!(
            group = %self.options.group,
            holder_id = %self.holder_id,
            ttl_ms = self.options.ttl.as_millis() as u64,
            wait_ms = self.options.wait.as_millis() as u64,
            "Campaigning for leadership"
        );
        *campaign = Some(tokio::spawn(campaign_loop(Arc::downgrade(self))));
    }

    /// Acquire or renew the lease once
    ///
    /// # Returns
    ///
    /// `true` if this process holds the lease afterwards
    ///
    /// # Errors
    ///
    /// Returns a `Leadership` error if the database cannot be reached.
    pub async fn try_acquire(&self) -> Result<bool> {
        let statement = format!(
            r#"
            INSERT INTO {table} AS lease (group_name, holder_id, expires_at)
            VALUES ($1, $2, now() + make_interval(secs => $3::double precision))
            ON CONFLICT (group_name) DO UPDATE
                SET holder_id = EXCLUDED.holder_id, expires_at = EXCLUDED.expires_at
                WHERE lease.holder_id = EXCLUDED.holder_id OR lease.expires_at < now()
            RETURNING holder_id
            "#,
            table = self.options.table
        );
        let ttl_secs = self.options.ttl.as_secs_f64();
        let rows = self
            .client
            .query(&statement, &[&self.options.group, &self.holder_id, &ttl_secs])
            .await
            .map_err(|e| TidemarkError::Leadership(e.to_string()))?;
        Ok(!rows.is_empty())
    }

    fn set_leader(&self, leader: bool) {
        if self.leader.swap(leader, Ordering::SeqCst) == leader {
            return;
        }
        let event = if leader {
            tracing::info!(group = %self.options.group, "Acquired leadership");
            LeadershipEvent::Elected
        } else {
            tracing::warn!(group = %self.options.group, "Lost leadership");
            LeadershipEvent::Revoked
        };
        let _ = self.events.send(event);
    }

    async fn release(&self) -> Result<()> {
        let statement = format!(
            "DELETE FROM {} WHERE group_name = $1 AND holder_id = $2",
            self.options.table
        );
        self.client
            .execute(&statement, &[&self.options.group, &self.holder_id])
            .await
            .map_err(|e| TidemarkError::Leadership(e.to_string()))?;
        Ok(())
    }
}

/// Result of one bounded acquisition attempt
#[derive(Debug)]
enum Renewal {
    Held,
    HeldByOther,
    Failed(TidemarkError),
    TimedOut,
}

/// Time one attempt may take before a held lease could have lapsed
///
/// Without a held lease an attempt may take a whole `ttl`.
fn attempt_budget(last_renewal: Option<Instant>, ttl: Duration, now: Instant) -> Duration {
    match last_renewal {
        Some(at) => ttl.saturating_sub(now.saturating_duration_since(at)),
        None => ttl,
    }
}

async fn bounded<F>(attempt: F, budget: Duration) -> Renewal
where
    F: Future<Output = Result<bool>>,
{
    match tokio::time::timeout(budget, attempt).await {
        Ok(Ok(true)) => Renewal::Held,
        Ok(Ok(false)) => Renewal::HeldByOther,
        Ok(Err(e)) => Renewal::Failed(e),
        Err(_) => Renewal::TimedOut,
    }
}

impl PostgreSQLLeaderLease {
    /// Update leadership from an attempt sent at `sent_at`
    fn apply(&self, renewal: Renewal, sent_at: Instant, last_renewal: &mut Option<Instant>) {
        match renewal {
            Renewal::Held => {
                // The database starts the new ttl no earlier than this
                *last_renewal = Some(sent_at);
                self.set_leader(true);
            }
            Renewal::HeldByOther => {
                *last_renewal = None;
                self.set_leader(false);
            }
            Renewal::Failed(e) => {
                tracing::warn!(error = %e, "Failed to renew leadership lease");
                let lapsed = last_renewal.map_or(true, |at| at.elapsed() >= self.options.ttl);
                if lapsed {
                    *last_renewal = None;
                    self.set_leader(false);
                }
            }
            Renewal::TimedOut => {
                tracing::warn!(
                    ttl_ms = self.options.ttl.as_millis() as u64,
                    "Leadership lease renewal did not finish before the lease could lapse"
                );
                *last_renewal = None;
                self.set_leader(false);
            }
        }
    }
}

async fn campaign_loop(lease: Weak<PostgreSQLLeaderLease>) {
    let mut last_renewal: Option<Instant> = None;
    loop {
        let Some(this) = lease.upgrade() else {
            return;
        };

        let sent_at = Instant::now();
        let budget = attempt_budget(last_renewal, this.options.ttl, sent_at);
        let renewal = bounded(this.try_acquire(), budget).await;
        this.apply(renewal, sent_at, &mut last_renewal);

        let wait = this.options.wait;
        drop(this);
        tokio::time::sleep(wait).await;
    }
}

#[async_trait]
impl LeadershipSource for PostgreSQLLeaderLease {
    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<LeadershipEvent> {
        self.events.subscribe()
    }

    async fn resign(&self) -> Result<()> {
        if let Some(handle) = self.campaign.lock().await.take() {
            handle.abort();
        }
        let was_leader = self.is_leader();
        self.set_leader(false);
        if was_leader {
            self.release().await?;
            tracing::info!(group = %self.options.group, "Released leadership lease");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PostgreSQLConfig;
    use crate::config::secret_string;

    fn lease() -> Arc<PostgreSQLLeaderLease> {
        let client = PostgreSQLClient::new(PostgreSQLConfig {
            connection_string: secret_string("postgresql://localhost/db".to_string()),
            max_connections: 1,
            connection_timeout_seconds: 1,
            statement_timeout_seconds: 1,
        })
        .unwrap();
        client.close();
        PostgreSQLLeaderLease::new(
            Arc::new(client),
            LeaseOptions {
                table: "leader_leases".to_string(),
                group: "tidemark".to_string(),
                ttl: Duration::from_millis(5000),
                wait: Duration::from_millis(1000),
            },
        )
    }

    #[tokio::test]
    async fn test_holder_ids_are_unique() {
        assert_ne!(lease().holder_id(), lease().holder_id());
    }

    #[tokio::test]
    async fn test_set_leader_emits_only_transitions() {
        let lease = lease();
        let mut events = lease.subscribe();

        lease.set_leader(true);
        lease.set_leader(true);
        lease.set_leader(false);

        assert_eq!(events.recv().await.unwrap(), LeadershipEvent::Elected);
        assert_eq!(events.recv().await.unwrap(), LeadershipEvent::Revoked);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_database_is_a_leadership_error() {
        let lease = lease();
        assert!(matches!(
            lease.try_acquire().await,
            Err(TidemarkError::Leadership(_))
        ));
    }

    #[tokio::test]
    async fn test_resign_as_follower_does_not_touch_database() {
        let lease = lease();
        lease.resign().await.unwrap();
        assert!(!lease.is_leader());
    }

    #[test]
    fn test_attempt_budget_is_time_left_on_lease() {
        let ttl = Duration::from_millis(5000);
        let now = Instant::now();
        assert_eq!(attempt_budget(None, ttl, now), ttl);
        assert_eq!(
            attempt_budget(Some(now - Duration::from_millis(1500)), ttl, now),
            Duration::from_millis(3500)
        );
        assert!(attempt_budget(Some(now - Duration::from_secs(6)), ttl, now).is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_attempt_times_out_within_budget() {
        let started = tokio::time::Instant::now();
        let renewal = bounded(
            std::future::pending::<Result<bool>>(),
            Duration::from_millis(3500),
        )
        .await;
        assert!(matches!(renewal, Renewal::TimedOut));
        assert_eq!(started.elapsed(), Duration::from_millis(3500));
    }

    #[tokio::test]
    async fn test_timed_out_renewal_revokes_leadership() {
        let lease = lease();
        let mut events = lease.subscribe();
        let mut last_renewal = None;

        lease.apply(Renewal::Held, Instant::now(), &mut last_renewal);
        assert!(lease.is_leader());
        assert!(last_renewal.is_some());

        lease.apply(Renewal::TimedOut, Instant::now(), &mut last_renewal);
        assert!(!lease.is_leader());
        assert!(last_renewal.is_none());
        assert_eq!(events.recv().await.unwrap(), LeadershipEvent::Elected);
        assert_eq!(events.recv().await.unwrap(), LeadershipEvent::Revoked);
    }

    #[tokio::test]
    async fn test_failed_renewal_keeps_lease_until_it_lapses() {
        let lease = lease();
        let mut last_renewal = None;
        lease.apply(Renewal::Held, Instant::now(), &mut last_renewal);

        lease.apply(
            Renewal::Failed(TidemarkError::Leadership("timeout".to_string())),
            Instant::now(),
            &mut last_renewal,
        );
        assert!(lease.is_leader());

        let lapsed = Some(Instant::now() - Duration::from_secs(10));
        last_renewal = lapsed;
        lease.apply(
            Renewal::Failed(TidemarkError::Leadership("timeout".to_string())),
            Instant::now(),
            &mut last_renewal,
        );
        assert!(!lease.is_leader());
    }
}
