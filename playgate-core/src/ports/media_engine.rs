use std::sync::Arc;

use async_trait::async_trait;
use playgate_model::StreamFault;
use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;

/// Events emitted by a media engine during one session.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Periodic position report while playing
    TimeUpdate { position_ms: u64, duration_ms: u64 },
    /// Source metadata became available
    LoadedMetadata { duration_ms: u64 },
    /// Buffering started or stopped (advisory, never a fault)
    Buffering(bool),
    /// Playback started or resumed
    Playing,
    /// The engine hit a fault; classification drives recovery
    Fault(StreamFault),
    /// Natural end of the stream
    Ended,
}

/// One adaptive-bitrate playback engine instance.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Open a source and begin playback at the given position.
    async fn open(&self, source: &Url, resume_position_ms: u64) -> Result<()>;

    async fn seek(&self, position_ms: u64) -> Result<()>;

    /// Restart loading of the current segment set without tearing the
    /// session down. Used for network faults.
    async fn resume_loading(&self) -> Result<()>;

    /// Attempt the engine's internal media-error recovery.
    async fn recover_media(&self) -> Result<()>;

    /// Release the engine. Events stop after this resolves.
    async fn shutdown(&self) -> Result<()>;

    /// Take the engine's event stream. Yields `None` if already taken.
    async fn take_events(&self) -> Option<mpsc::Receiver<EngineEvent>>;
}

/// Capability to acquire fresh engine instances.
///
/// Used at session open and again by the manual retry path, which must get a
/// genuinely new instance rather than reviving a failed one.
#[async_trait]
pub trait MediaEngineProvider: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn MediaEngine>>;
}
