//! Leadership source for single-instance deployments
//!
//! Used when leader election is disabled: the process is leader from the
//! start and never loses it.

use super::traits::{LeadershipEvent, LeadershipSource};
use crate::domain::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Always-elected leadership source
pub struct StaticLeadership {
    leader: AtomicBool,
    events: broadcast::Sender<LeadershipEvent>,
}

impl StaticLeadership {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(4);
        Self {
            leader: AtomicBool::new(true),
            events,
        }
    }
}

impl Default for StaticLeadership {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadershipSource for StaticLeadership {
    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<LeadershipEvent> {
        self.events.subscribe()
    }

    async fn resign(&self) -> Result<()> {
        if self.leader.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(LeadershipEvent::Revoked);
        }
        Ok(())
    }
}
