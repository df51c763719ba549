//! Watermark storage abstraction and backend factory

pub mod factory;
pub mod traits;

pub use factory::{
    create_backend, create_change_feed, create_client, create_leadership,
    create_watermark_store, Backend,
};
pub use traits::WatermarkStore;
