//! Gate-or-play decisions and the per-session event loop.
//!
//! The coordinator owns the shared [`AdSessionManager`] and the store
//! handles; each accepted request becomes a [`PlaybackSession`] that drives
//! one engine's events into the progress tracker and recovery controller
//! until the stream ends or the viewer leaves. The gate itself is advisory:
//! every outcome allows playback, and the resolved [`RewardOutcome`] is
//! surfaced so the shell can word its UI.

use std::sync::Arc;

use playgate_model::{ContentId, ContentRef, ProgressRecord, RewardOutcome, UserId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ad::AdSessionManager;
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::ports::{
    AdNetwork, EngineEvent, MediaEngineProvider, ProgressCache, ProgressStore,
};
use crate::progress::PlaybackProgressTracker;
use crate::recovery::StreamRecoveryController;

/// One playback ask: the item, the viewer's tier, optionally what follows.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub content: ContentRef,
    pub free_tier: bool,
    pub up_next: Option<ContentRef>,
}

impl PlaybackRequest {
    pub fn free_tier(content: ContentRef) -> Self {
        Self {
            content,
            free_tier: true,
            up_next: None,
        }
    }

    pub fn premium(content: ContentRef) -> Self {
        Self {
            content,
            free_tier: false,
            up_next: None,
        }
    }

    pub fn with_up_next(mut self, next: ContentRef) -> Self {
        self.up_next = Some(next);
        self
    }
}

/// Signals surfaced to the shell while a session runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSignal {
    Buffering(bool),
    Playing,
    Progress { position_ms: u64, duration_ms: u64 },
    /// Unrecoverable stream fault; the session stays alive awaiting a
    /// retry or leave
    Failed { reason: String },
    /// The stream reached its natural end
    Completed,
    UpNextStarted(ContentId),
}

/// Commands the shell can send into a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Manual retry after a fatal failure; re-acquires a fresh engine
    Retry,
    /// Leave playback; runs exactly one final save
    Leave,
}

/// Control handle for a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Ask the session to re-acquire a fresh engine after a fatal failure.
    pub async fn retry(&self) -> bool {
        self.commands.send(SessionCommand::Retry).await.is_ok()
    }

    /// Leave playback. Idempotent; the session runs exactly one final save.
    pub fn leave(&self) {
        self.cancel.cancel();
    }
}

pub struct PlaybackGateCoordinator {
    ads: AdSessionManager,
    engines: Arc<dyn MediaEngineProvider>,
    store: Arc<dyn ProgressStore>,
    cache: Arc<dyn ProgressCache>,
    config: PlaybackConfig,
}

impl std::fmt::Debug for PlaybackGateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackGateCoordinator")
            .field("ads", &self.ads)
            .finish_non_exhaustive()
    }
}

impl PlaybackGateCoordinator {
    pub fn new(
        network: Arc<dyn AdNetwork>,
        engines: Arc<dyn MediaEngineProvider>,
        store: Arc<dyn ProgressStore>,
        cache: Arc<dyn ProgressCache>,
        config: PlaybackConfig,
    ) -> Self {
        let ads = AdSessionManager::new(network, config.clone());
        Self {
            ads,
            engines,
            store,
            cache,
            config,
        }
    }

    pub fn ads(&self) -> &AdSessionManager {
        &self.ads
    }

    /// Warm the ad slot in the background so the first gate finds an
    /// instance ready.
    pub fn warm_ad_slot(&self) {
        let ads = self.ads.clone();
        tokio::spawn(async move {
            ads.preload().await;
        });
    }

    /// Most recently updated in-progress items for the home surface.
    pub async fn continue_watching(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ProgressRecord>> {
        self.store.continue_watching(user, limit).await
    }

    /// Decide gate-or-play, open the stream, and hand back the session.
    ///
    /// Free tier runs the reward gate first; the wait is bounded by the ad
    /// manager's own display timeout and no additional timeout is applied
    /// here. The `skip` token is the viewer's explicit decline: it settles
    /// the gate as denied-but-allowed. The gate never hard-blocks.
    pub async fn request_playback(
        &self,
        user: UserId,
        request: PlaybackRequest,
        skip: CancellationToken,
    ) -> Result<(PlaybackSession, mpsc::Receiver<PlaybackSignal>)> {
        let outcome = if request.free_tier {
            self.ads.acquire_reward(skip).await
        } else {
            RewardOutcome::NotRequired
        };
        info!(content = %request.content.id, outcome = %outcome, "playback gate resolved");

        let tracker = Arc::new(PlaybackProgressTracker::new(
            user.clone(),
            &request.content,
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            self.config.clone(),
        ));
        let resume_position_ms = tracker.load().await;

        let engine = self.engines.create().await?;
        engine
            .open(&request.content.source, resume_position_ms)
            .await?;
        let events = engine.take_events().await.ok_or_else(|| {
            PlaybackError::Engine("engine event stream already taken".to_string())
        })?;

        let controller = StreamRecoveryController::new(
            Arc::clone(&engine),
            Arc::clone(&self.engines),
            request.content.clone(),
            &self.config,
        );

        let (signals_tx, signals_rx) = mpsc::channel(64);
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let session = PlaybackSession {
            id: Uuid::now_v7(),
            user,
            outcome,
            resume_position_ms,
            content: request.content,
            up_next: request.up_next,
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
            tracker,
            controller,
            events,
            signals: signals_tx,
            commands: commands_rx,
            handle: SessionHandle {
                commands: commands_tx,
                cancel: cancel.clone(),
            },
            cancel,
            last_position: (resume_position_ms, 0),
            ended_naturally: false,
            finished: false,
        };
        Ok((session, signals_rx))
    }
}

/// One playback lifetime: gate outcome, engine event pump, progress
/// persistence, and fault recovery for a single viewer/content pair.
pub struct PlaybackSession {
    id: Uuid,
    user: UserId,
    outcome: RewardOutcome,
    resume_position_ms: u64,
    content: ContentRef,
    up_next: Option<ContentRef>,
    store: Arc<dyn ProgressStore>,
    cache: Arc<dyn ProgressCache>,
    config: PlaybackConfig,
    tracker: Arc<PlaybackProgressTracker>,
    controller: StreamRecoveryController,
    events: mpsc::Receiver<EngineEvent>,
    signals: mpsc::Sender<PlaybackSignal>,
    commands: mpsc::Receiver<SessionCommand>,
    handle: SessionHandle,
    cancel: CancellationToken,
    /// Last observed (position, duration), for the final save
    last_position: (u64, u64),
    ended_naturally: bool,
    finished: bool,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("content", &self.content.id)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl PlaybackSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// How the gate resolved, for UI wording only; playback is always on.
    pub fn outcome(&self) -> RewardOutcome {
        self.outcome
    }

    pub fn resume_position_ms(&self) -> u64 {
        self.resume_position_ms
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Drive the session until the stream ends, the viewer leaves, or a
    /// fatal failure goes unretried. Runs exactly one final save on the way
    /// out, waiting for any in-flight interval save rather than racing it.
    pub async fn run(mut self) -> Result<()> {
        let result = self.drive().await;
        if !self.finished {
            self.tracker
                .finish(self.last_position.0, self.last_position.1, self.ended_naturally)
                .await;
        }
        result
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(session = %self.id, content = %self.content.id, "leaving playback");
                    return Ok(());
                }
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Retry) => self.retry().await?,
                    Some(SessionCommand::Leave) | None => return Ok(()),
                },
                event = self.events.recv() => match event {
                    Some(event) => {
                        if self.handle_event(event).await? {
                            return Ok(());
                        }
                    }
                    None => {
                        // Engine stream gone. After a fatal fault the
                        // session stays alive awaiting retry or leave;
                        // otherwise the engine simply went away.
                        if self.controller.failure().is_none() {
                            return Ok(());
                        }
                        if !self.await_retry_or_exit().await? {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn await_retry_or_exit(&mut self) -> Result<bool> {
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(false),
            command = self.commands.recv() => match command {
                Some(SessionCommand::Retry) => {
                    self.retry().await?;
                    Ok(true)
                }
                Some(SessionCommand::Leave) | None => Ok(false),
            },
        }
    }

    async fn retry(&mut self) -> Result<()> {
        if self.controller.failure().is_none() {
            debug!(session = %self.id, "retry ignored; no failure to recover from");
            return Ok(());
        }
        let engine = self.controller.retry(self.last_position.0).await?;
        self.events = engine.take_events().await.ok_or_else(|| {
            PlaybackError::Engine("fresh engine event stream already taken".to_string())
        })?;
        Ok(())
    }

    /// Returns true when the session is over.
    async fn handle_event(&mut self, event: EngineEvent) -> Result<bool> {
        match event {
            EngineEvent::TimeUpdate {
                position_ms,
                duration_ms,
            } => {
                // Some engines omit the duration from early ticks; keep the
                // one metadata reported.
                let duration_ms = if duration_ms == 0 {
                    self.last_position.1
                } else {
                    duration_ms
                };
                self.last_position = (position_ms, duration_ms);
                // Writes never block the playback timeline.
                let tracker = Arc::clone(&self.tracker);
                tokio::spawn(async move {
                    tracker.on_tick(position_ms, duration_ms).await;
                });
                let _ = self.signals.try_send(PlaybackSignal::Progress {
                    position_ms,
                    duration_ms,
                });
                Ok(false)
            }
            EngineEvent::LoadedMetadata { duration_ms } => {
                self.controller.on_loaded();
                if self.last_position.1 == 0 {
                    self.last_position.1 = duration_ms;
                }
                Ok(false)
            }
            EngineEvent::Buffering(active) => {
                self.controller.on_buffering(active);
                let _ = self.signals.try_send(PlaybackSignal::Buffering(active));
                Ok(false)
            }
            EngineEvent::Playing => {
                self.controller.on_playing();
                let _ = self.signals.try_send(PlaybackSignal::Playing);
                Ok(false)
            }
            EngineEvent::Fault(fault) => {
                if let Some(failure) = self.controller.handle_fault(fault).await? {
                    let _ = self.signals.try_send(PlaybackSignal::Failed {
                        reason: failure.reason,
                    });
                }
                Ok(false)
            }
            EngineEvent::Ended => self.handle_ended().await,
        }
    }

    async fn handle_ended(&mut self) -> Result<bool> {
        self.ended_naturally = true;
        self.tracker
            .finish(self.last_position.0, self.last_position.1, true)
            .await;
        self.finished = true;
        let _ = self.signals.try_send(PlaybackSignal::Completed);

        let Some(next) = self.up_next.take() else {
            return Ok(true);
        };

        let tracker = Arc::new(PlaybackProgressTracker::new(
            self.user.clone(),
            &next,
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            self.config.clone(),
        ));
        let resume = tracker.load().await;
        if let Err(err) = self.controller.play_next(&next, resume).await {
            warn!(next = %next.id, error = %err, "could not start up-next item");
            return Ok(true);
        }

        self.tracker = tracker;
        self.content = next.clone();
        self.last_position = (resume, 0);
        self.ended_naturally = false;
        self.finished = false;
        let _ = self
            .signals
            .try_send(PlaybackSignal::UpNextStarted(next.id));
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playgate_model::{ContentKind, FailOpenReason};
    use url::Url;

    use crate::infra::memory::{MemoryProgressCache, MemoryProgressStore};
    use crate::testing::stubs::{AdScript, ScriptedAdNetwork, StubEngineProvider};

    fn content(id: &str) -> ContentRef {
        ContentRef::new(
            id,
            ContentKind::Movie,
            Url::parse(&format!("https://cdn.example/{id}/master.m3u8")).expect("url"),
        )
    }

    struct Fixture {
        network: ScriptedAdNetwork,
        engines: Arc<StubEngineProvider>,
        store: Arc<MemoryProgressStore>,
        coordinator: PlaybackGateCoordinator,
    }

    fn fixture(network: ScriptedAdNetwork) -> Fixture {
        let engines = Arc::new(StubEngineProvider::new());
        let store = Arc::new(MemoryProgressStore::new());
        let coordinator = PlaybackGateCoordinator::new(
            Arc::new(network.clone()),
            Arc::clone(&engines) as Arc<dyn MediaEngineProvider>,
            Arc::clone(&store) as Arc<dyn ProgressStore>,
            Arc::new(MemoryProgressCache::new()),
            PlaybackConfig::default(),
        );
        Fixture {
            network,
            engines,
            store,
            coordinator,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn premium_tier_bypasses_the_gate() {
        let fx = fixture(ScriptedAdNetwork::always_rewarding());

        let (session, _signals) = fx
            .coordinator
            .request_playback(
                UserId::from("viewer-1"),
                PlaybackRequest::premium(content("movie-1")),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(session.outcome(), RewardOutcome::NotRequired);
        assert_eq!(fx.network.created(), 0);
        assert_eq!(fx.engines.created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn free_tier_fails_open_when_no_ad_is_ready() {
        let fx = fixture(ScriptedAdNetwork::silent());

        let (session, _signals) = fx
            .coordinator
            .request_playback(
                UserId::from("viewer-1"),
                PlaybackRequest::free_tier(content("movie-1")),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            session.outcome(),
            RewardOutcome::FailOpen(FailOpenReason::NoAdAvailable)
        );
        // Content opened regardless.
        assert_eq!(fx.engines.created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn free_tier_earns_the_reward_when_an_ad_is_ready() {
        let fx = fixture(ScriptedAdNetwork::new(AdScript::Reward {
            after: std::time::Duration::from_secs(2),
        }));
        assert!(fx.coordinator.ads().preload().await);

        let (session, _signals) = fx
            .coordinator
            .request_playback(
                UserId::from("viewer-1"),
                PlaybackRequest::free_tier(content("movie-1")),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(session.outcome(), RewardOutcome::Earned);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_opens_at_the_stored_resume_position() {
        let fx = fixture(ScriptedAdNetwork::silent());
        fx.store.insert(
            UserId::from("viewer-1"),
            ProgressRecord::at(
                ContentId::from("movie-1"),
                ContentKind::Movie,
                600_000,
                1_200_000,
            ),
        );

        let (session, _signals) = fx
            .coordinator
            .request_playback(
                UserId::from("viewer-1"),
                PlaybackRequest::premium(content("movie-1")),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(session.resume_position_ms(), 600_000);
        let engine = fx.engines.last_engine().expect("engine");
        assert_eq!(engine.opens()[0].1, 600_000);
    }
}
