//! Top-level orchestration: gate-or-play and the session event loop.

pub mod coordinator;

pub use coordinator::{
    PlaybackGateCoordinator, PlaybackRequest, PlaybackSession, PlaybackSignal,
    SessionCommand, SessionHandle,
};
