//! Stream fault classification and bounded recovery.

pub mod controller;

pub use controller::{PlaybackFailure, RecoveryAction, StreamRecoveryController};
