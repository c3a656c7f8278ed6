//! Capability traits for every external collaborator the core consumes.
//!
//! No wire format is defined here; adapters decide how each capability is
//! actually reached (SDK bindings, HTTP, files). The core only ever talks to
//! these traits, which is also what makes the whole subsystem drivable from
//! tests with the stubs in [`crate::testing`].

pub mod ad_network;
pub mod media_engine;
pub mod progress_cache;
pub mod progress_store;

pub use ad_network::{AdEvent, AdHandle, AdNetwork};
pub use media_engine::{EngineEvent, MediaEngine, MediaEngineProvider};
pub use progress_cache::{ProgressCache, progress_cache_key};
pub use progress_store::ProgressStore;
