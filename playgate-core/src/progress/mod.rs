//! Debounced dual-store persistence of watch position.

pub mod tracker;

pub use tracker::PlaybackProgressTracker;
