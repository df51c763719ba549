//! Change feed abstraction layer

pub mod channel;
pub mod traits;

pub use channel::ChannelSubscription;
pub use traits::{ChangeFeed, FeedNotification, SubscribeRequest, Subscription, WatchOptions};
