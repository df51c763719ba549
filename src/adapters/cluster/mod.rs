//! Connection liveness and leadership election ports

pub mod static_leader;
pub mod traits;

pub use static_leader::StaticLeadership;
pub use traits::{Connection, ConnectionEvent, LeadershipEvent, LeadershipSource};
