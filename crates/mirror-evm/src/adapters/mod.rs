//! # Adapters Layer (Outer Hexagon)
//!
//! Implementations of the driven ports that need no external system:
//! in-memory snapshots, static fee inputs and the caching decorator.
//! Production deployments supply their own database-backed snapshot.

pub mod cached;
pub mod in_memory;
pub mod pricing;

pub use cached::CachedSnapshot;
pub use in_memory::InMemorySnapshot;
pub use pricing::{InMemoryBlockHashes, StaticExchangeRates, StaticFeeSchedule, BLOCK_HASH_WINDOW};
