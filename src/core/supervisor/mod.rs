//! Leadership-gated supervision of watchers

#[allow(clippy::module_inception)]
pub mod supervisor;

pub use supervisor::Supervisor;
