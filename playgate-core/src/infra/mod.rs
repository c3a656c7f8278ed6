//! Adapters for the capability ports: in-memory stores for tests, offline
//! use, and simulation, plus the on-disk local cache.

pub mod disk;
pub mod memory;

pub use disk::DiskProgressCache;
pub use memory::{MemoryProgressCache, MemoryProgressStore};
