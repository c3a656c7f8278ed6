//! Translates media-engine fault signals into bounded recovery actions so a
//! recoverable fault never surfaces as a user-facing error.
//!
//! Policy, ordered, first match wins: network faults restart loading of the
//! current segment set and may repeat indefinitely; decode-level media
//! faults get one engine-internal recovery per session before escalating;
//! unsupported sources and fatal unknowns tear the session down with a
//! human-readable reason and a manual retry that acquires a fresh engine.
//! Buffering and loading signals are advisory state only.

use std::sync::Arc;
use std::time::Duration;

use playgate_model::{ContentRef, FaultClass, StreamFault};
use tracing::{error, info, warn};

use crate::config::PlaybackConfig;
use crate::error::Result;
use crate::ports::{MediaEngine, MediaEngineProvider};

/// What the policy decided for one fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Restart loading of the current segment set; keep the session
    ResumeLoading,
    /// One-shot engine-internal media recovery
    RecoverMedia,
    /// Tear down and surface to the viewer
    Fatal { reason: String },
}

/// Terminal user-facing failure. Carries the reason shown to the viewer and
/// is cleared by a successful manual retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFailure {
    pub reason: String,
}

pub struct StreamRecoveryController {
    engine: Arc<dyn MediaEngine>,
    provider: Arc<dyn MediaEngineProvider>,
    content: ContentRef,
    media_faults: u32,
    media_fault_budget: u32,
    up_next_grace: Duration,
    is_buffering: bool,
    is_loaded: bool,
    failure: Option<PlaybackFailure>,
}

impl std::fmt::Debug for StreamRecoveryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRecoveryController")
            .field("content", &self.content.id)
            .field("media_faults", &self.media_faults)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

impl StreamRecoveryController {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        provider: Arc<dyn MediaEngineProvider>,
        content: ContentRef,
        config: &PlaybackConfig,
    ) -> Self {
        Self {
            engine,
            provider,
            content,
            media_faults: 0,
            media_fault_budget: config.media_fault_budget,
            up_next_grace: config.up_next_grace(),
            is_buffering: false,
            is_loaded: false,
            failure: None,
        }
    }

    pub fn engine(&self) -> Arc<dyn MediaEngine> {
        Arc::clone(&self.engine)
    }

    pub fn is_buffering(&self) -> bool {
        self.is_buffering
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn failure(&self) -> Option<&PlaybackFailure> {
        self.failure.as_ref()
    }

    pub fn on_buffering(&mut self, active: bool) {
        self.is_buffering = active;
    }

    pub fn on_loaded(&mut self) {
        self.is_loaded = true;
    }

    pub fn on_playing(&mut self) {
        self.is_buffering = false;
    }

    fn classify(&mut self, fault: &StreamFault) -> RecoveryAction {
        match fault.class {
            FaultClass::Network => RecoveryAction::ResumeLoading,
            FaultClass::Media => {
                self.media_faults += 1;
                if self.media_faults > self.media_fault_budget {
                    RecoveryAction::Fatal {
                        reason: format!(
                            "Playback failed after repeated media errors: {}",
                            fault.detail
                        ),
                    }
                } else {
                    RecoveryAction::RecoverMedia
                }
            }
            FaultClass::Unsupported => RecoveryAction::Fatal {
                reason: format!("This stream cannot be played here: {}", fault.detail),
            },
            FaultClass::Unknown if fault.fatal => RecoveryAction::Fatal {
                reason: format!("Playback failed: {}", fault.detail),
            },
            // Unclassified but non-fatal: the gentlest answer.
            FaultClass::Unknown => RecoveryAction::ResumeLoading,
        }
    }

    /// Apply the policy to one fault. Returns the failure when it was fatal.
    pub async fn handle_fault(&mut self, fault: StreamFault) -> Result<Option<PlaybackFailure>> {
        match self.classify(&fault) {
            RecoveryAction::ResumeLoading => {
                warn!(fault = %fault, "resuming stream loading after fault");
                self.engine.resume_loading().await?;
                Ok(None)
            }
            RecoveryAction::RecoverMedia => {
                warn!(
                    fault = %fault,
                    attempt = self.media_faults,
                    "attempting media-error recovery"
                );
                self.engine.recover_media().await?;
                Ok(None)
            }
            RecoveryAction::Fatal { reason } => {
                error!(fault = %fault, "unrecoverable stream fault; tearing session down");
                if let Err(err) = self.engine.shutdown().await {
                    warn!(error = %err, "engine shutdown after fatal fault failed");
                }
                let failure = PlaybackFailure { reason };
                self.failure = Some(failure.clone());
                Ok(Some(failure))
            }
        }
    }

    /// Manual retry after a fatal failure: acquires a genuinely fresh engine
    /// (never revives the torn-down one) and reopens the content.
    pub async fn retry(&mut self, resume_position_ms: u64) -> Result<Arc<dyn MediaEngine>> {
        info!(content = %self.content.id, "manual retry; acquiring a fresh engine");
        let engine = self.provider.create().await?;
        engine.open(&self.content.source, resume_position_ms).await?;
        self.engine = Arc::clone(&engine);
        self.failure = None;
        self.media_faults = 0;
        self.is_loaded = false;
        self.is_buffering = false;
        Ok(engine)
    }

    /// Natural end-of-stream follow-up: after the trailing-UI grace delay,
    /// open the next item on the same engine.
    pub async fn play_next(&mut self, next: &ContentRef, resume_position_ms: u64) -> Result<()> {
        tokio::time::sleep(self.up_next_grace).await;
        info!(next = %next.id, "starting up-next item");
        self.engine.open(&next.source, resume_position_ms).await?;
        self.content = next.clone();
        self.media_faults = 0;
        self.is_loaded = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playgate_model::ContentKind;
    use tokio::time::Instant;
    use url::Url;

    use crate::testing::stubs::{ScriptedMediaEngine, StubEngineProvider};

    fn content(id: &str) -> ContentRef {
        ContentRef::new(
            id,
            ContentKind::Movie,
            Url::parse(&format!("https://cdn.example/{id}/master.m3u8")).expect("url"),
        )
    }

    fn controller() -> (
        Arc<ScriptedMediaEngine>,
        Arc<StubEngineProvider>,
        StreamRecoveryController,
    ) {
        let engine = Arc::new(ScriptedMediaEngine::new());
        let provider = Arc::new(StubEngineProvider::new());
        let controller = StreamRecoveryController::new(
            Arc::clone(&engine) as Arc<dyn MediaEngine>,
            Arc::clone(&provider) as Arc<dyn MediaEngineProvider>,
            content("movie-1"),
            &PlaybackConfig::default(),
        );
        (engine, provider, controller)
    }

    #[tokio::test]
    async fn network_faults_resume_without_escalation() {
        let (engine, _, mut controller) = controller();

        let first = controller
            .handle_fault(StreamFault::network("segment fetch failed"))
            .await
            .unwrap();
        assert_eq!(first, None);

        // A second, unrelated network fault later in the session.
        let second = controller
            .handle_fault(StreamFault::network("manifest refresh failed"))
            .await
            .unwrap();
        assert_eq!(second, None);

        assert_eq!(engine.resume_loading_calls(), 2);
        assert!(!engine.is_shut_down());
    }

    #[tokio::test]
    async fn second_media_fault_escalates_to_fatal() {
        let (engine, _, mut controller) = controller();

        let first = controller
            .handle_fault(StreamFault::media("decode stall"))
            .await
            .unwrap();
        assert_eq!(first, None);
        assert_eq!(engine.recover_media_calls(), 1);

        let second = controller
            .handle_fault(StreamFault::media("decode stall again"))
            .await
            .unwrap();
        let failure = second.expect("second media fault is fatal");
        assert!(failure.reason.contains("media errors"));
        assert!(engine.is_shut_down());
        assert_eq!(controller.failure(), Some(&failure));
    }

    #[tokio::test]
    async fn unsupported_fault_is_fatal_immediately() {
        let (engine, _, mut controller) = controller();

        let failure = controller
            .handle_fault(StreamFault::unsupported("codec not available"))
            .await
            .unwrap()
            .expect("fatal");
        assert!(failure.reason.contains("cannot be played"));
        assert!(engine.is_shut_down());
    }

    #[tokio::test]
    async fn unknown_faults_follow_their_fatal_flag() {
        let (engine, _, mut controller) = controller();

        let soft = controller
            .handle_fault(StreamFault::unknown(false, "transient glitch"))
            .await
            .unwrap();
        assert_eq!(soft, None);
        assert_eq!(engine.resume_loading_calls(), 1);

        let hard = controller
            .handle_fault(StreamFault::unknown(true, "engine gave up"))
            .await
            .unwrap();
        assert!(hard.is_some());
    }

    #[tokio::test]
    async fn buffering_signals_never_trigger_recovery() {
        let (engine, _, mut controller) = controller();

        controller.on_buffering(true);
        assert!(controller.is_buffering());
        controller.on_loaded();
        assert!(controller.is_loaded());
        controller.on_playing();
        assert!(!controller.is_buffering());

        assert_eq!(engine.resume_loading_calls(), 0);
        assert_eq!(engine.recover_media_calls(), 0);
        assert!(!engine.is_shut_down());
    }

    #[tokio::test]
    async fn retry_acquires_a_fresh_engine_and_clears_the_failure() {
        let (_, provider, mut controller) = controller();

        controller
            .handle_fault(StreamFault::unsupported("codec not available"))
            .await
            .unwrap();
        assert!(controller.failure().is_some());

        controller.retry(480_000).await.unwrap();
        assert!(controller.failure().is_none());
        assert_eq!(provider.created(), 1);

        let fresh = provider.last_engine().expect("fresh engine");
        assert_eq!(fresh.opens().len(), 1);
        assert_eq!(fresh.opens()[0].1, 480_000);
    }

    #[tokio::test]
    async fn retry_resets_the_media_fault_budget() {
        let (_, provider, mut controller) = controller();

        controller
            .handle_fault(StreamFault::media("decode stall"))
            .await
            .unwrap();
        controller
            .handle_fault(StreamFault::media("decode stall again"))
            .await
            .unwrap()
            .expect("fatal");

        controller.retry(0).await.unwrap();
        let fresh = provider.last_engine().expect("fresh engine");

        // The budget starts over on the fresh engine.
        let after_retry = controller
            .handle_fault(StreamFault::media("decode stall"))
            .await
            .unwrap();
        assert_eq!(after_retry, None);
        assert_eq!(fresh.recover_media_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn play_next_waits_the_grace_delay() {
        let (engine, _, mut controller) = controller();

        let start = Instant::now();
        controller.play_next(&content("movie-2"), 0).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(2));
        let opens = engine.opens();
        assert_eq!(opens.len(), 1);
        assert!(opens[0].0.as_str().contains("movie-2"));
    }
}
