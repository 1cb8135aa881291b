//! Durable state: checkpoint and result cache.

pub mod cache;
pub mod checkpoint;

pub use cache::ResultCache;
pub use checkpoint::CheckpointStore;
