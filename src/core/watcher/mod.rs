//! Change-feed watcher
//!
//! - [`state`] - Lifecycle states
//! - [`handlers`] - Callback set attached to a watcher
//! - [`restart`] - Backoff between restarts
//! - [`watcher`] - The watcher itself

pub mod handlers;
pub mod restart;
pub mod state;
#[allow(clippy::module_inception)]
pub mod watcher;

pub use handlers::{ChangeCallback, ErrorCallback, LifecycleCallback, WatchHandlers};
pub use restart::RestartPolicy;
pub use state::WatcherState;
pub use watcher::{ChangeFeedWatcher, WatcherConfig};
