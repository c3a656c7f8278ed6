//! Makes playback resumable across sessions without excessive write
//! amplification.
//!
//! Position reports are accepted at a bounded minimum interval and skipped
//! for near-duplicate deltas; every accepted report is written to the
//! authoritative remote store and mirrored best-effort into the local cache.
//! Resume eligibility applies the same completion boundary the write path
//! uses, so a finished item restarts from zero on every device.

use std::sync::Arc;

use playgate_model::{ContentId, ContentKind, ContentRef, ProgressRecord, UserId};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PlaybackConfig;
use crate::ports::{ProgressCache, ProgressStore, progress_cache_key};

#[derive(Debug, Default)]
struct TrackerState {
    last_saved_position: Option<u64>,
    last_write_at: Option<Instant>,
    completion_written: bool,
}

pub struct PlaybackProgressTracker {
    user: UserId,
    content_id: ContentId,
    kind: ContentKind,
    cache_key: String,
    store: Arc<dyn ProgressStore>,
    cache: Arc<dyn ProgressCache>,
    config: PlaybackConfig,
    state: Mutex<TrackerState>,
}

impl std::fmt::Debug for PlaybackProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackProgressTracker")
            .field("user", &self.user)
            .field("content_id", &self.content_id)
            .finish_non_exhaustive()
    }
}

impl PlaybackProgressTracker {
    pub fn new(
        user: UserId,
        content: &ContentRef,
        store: Arc<dyn ProgressStore>,
        cache: Arc<dyn ProgressCache>,
        config: PlaybackConfig,
    ) -> Self {
        let cache_key = progress_cache_key(&user, &content.id);
        Self {
            user,
            content_id: content.id.clone(),
            kind: content.kind,
            cache_key,
            store,
            cache,
            config,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Resume position for this content, in milliseconds, or 0.
    ///
    /// The remote record is authoritative; the local copy is only consulted
    /// when the remote fetch fails (offline). A record that is completed or
    /// past the completion boundary resumes from the start.
    pub async fn load(&self) -> u64 {
        match self.store.get(&self.user, &self.content_id).await {
            Ok(Some(record)) => record.resume_position_ms(),
            Ok(None) => 0,
            Err(err) => {
                warn!(
                    content = %self.content_id,
                    error = %err,
                    "remote progress fetch failed; trying the local cache"
                );
                self.peek_local().await.unwrap_or(0)
            }
        }
    }

    /// Fast-path read of the local copy, for UI rendered before the remote
    /// fetch resolves. May be stale; the remote answer wins.
    pub async fn peek_local(&self) -> Option<u64> {
        let json = match self.cache.get(&self.cache_key).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(err) => {
                debug!(error = %err, "local progress read failed");
                return None;
            }
        };
        match serde_json::from_str::<ProgressRecord>(&json) {
            Ok(record) => Some(record.resume_position_ms()),
            Err(err) => {
                debug!(error = %err, "discarding unreadable local progress record");
                None
            }
        }
    }

    /// Record a position report from the playing stream.
    ///
    /// At most one write per save interval; deltas under the minimum are not
    /// worth a write; a report arriving while a write is in flight is
    /// skipped, never raced. Reports without a meaningful duration are
    /// ignored.
    pub async fn on_tick(&self, position_ms: u64, duration_ms: u64) {
        if duration_ms == 0 {
            return;
        }
        let Ok(mut state) = self.state.try_lock() else {
            debug!("progress write in flight; skipping tick");
            return;
        };
        if let Some(at) = state.last_write_at
            && at.elapsed() < self.config.progress_save_interval()
        {
            return;
        }
        if let Some(last) = state.last_saved_position
            && position_ms.abs_diff(last) < self.config.progress_min_delta_ms
        {
            return;
        }
        self.persist(&mut state, position_ms, duration_ms).await;
    }

    /// Teardown save, called exactly once when the session ends.
    ///
    /// Waits for any in-flight interval write instead of racing it. The
    /// interval gate does not apply here; the delta gate still does, except
    /// for the very first save of the session. On a natural end the record
    /// is pinned to the full duration exactly once, so a final tick that
    /// fell slightly short of the boundary cannot leave a near-complete
    /// record dangling.
    pub async fn finish(&self, position_ms: u64, duration_ms: u64, natural_end: bool) {
        if duration_ms == 0 {
            return;
        }
        let mut state = self.state.lock().await;

        if natural_end {
            if !state.completion_written {
                self.persist(&mut state, duration_ms, duration_ms).await;
                state.completion_written = true;
            }
            return;
        }

        let meaningful = match state.last_saved_position {
            None => true,
            Some(last) => position_ms.abs_diff(last) >= self.config.progress_min_delta_ms,
        };
        if meaningful {
            self.persist(&mut state, position_ms, duration_ms).await;
        }
    }

    async fn persist(&self, state: &mut TrackerState, position_ms: u64, duration_ms: u64) {
        let record =
            ProgressRecord::at(self.content_id.clone(), self.kind, position_ms, duration_ms);

        match self.store.upsert_merge(&self.user, &record).await {
            Ok(()) => {
                state.last_saved_position = Some(position_ms);
                state.last_write_at = Some(Instant::now());
                debug!(
                    content = %self.content_id,
                    position_ms,
                    completed = record.completed,
                    "progress persisted"
                );
            }
            Err(err) => {
                // Hold the interval before retrying; the next eligible tick
                // carries the fresher position anyway.
                state.last_write_at = Some(Instant::now());
                warn!(
                    content = %self.content_id,
                    error = %err,
                    "remote progress write failed; will retry on a later tick"
                );
            }
        }

        // Best-effort local mirror, independent of the remote outcome.
        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(err) = self.cache.set(&self.cache_key, &json).await {
                    debug!(
                        error = %err,
                        "local progress mirror failed; the remote copy is authoritative"
                    );
                }
            }
            Err(err) => debug!(error = %err, "could not serialize progress record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use playgate_model::ContentKind;
    use url::Url;

    use crate::infra::memory::MemoryProgressCache;
    use crate::testing::stubs::FlakyProgressStore;

    struct Fixture {
        store: Arc<FlakyProgressStore>,
        cache: Arc<MemoryProgressCache>,
        tracker: PlaybackProgressTracker,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(FlakyProgressStore::new());
        let cache = Arc::new(MemoryProgressCache::new());
        let content = ContentRef::new(
            "movie-1",
            ContentKind::Movie,
            Url::parse("https://cdn.example/movie-1/master.m3u8").expect("url"),
        );
        let tracker = PlaybackProgressTracker::new(
            UserId::from("viewer-1"),
            &content,
            Arc::clone(&store) as Arc<dyn ProgressStore>,
            Arc::clone(&cache) as Arc<dyn ProgressCache>,
            PlaybackConfig::default(),
        );
        Fixture {
            store,
            cache,
            tracker,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn near_duplicate_ticks_persist_exactly_once() {
        let fx = fixture();

        fx.tracker.on_tick(60_000, 1_200_000).await;
        fx.tracker.on_tick(62_000, 1_200_000).await;

        assert_eq!(fx.store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_gate_holds_between_writes() {
        let fx = fixture();

        fx.tracker.on_tick(60_000, 1_200_000).await;
        // A large delta still waits for the interval.
        tokio::time::advance(Duration::from_secs(10)).await;
        fx.tracker.on_tick(300_000, 1_200_000).await;
        assert_eq!(fx.store.writes(), 1);

        tokio::time::advance(Duration::from_secs(20)).await;
        fx.tracker.on_tick(330_000, 1_200_000).await;
        assert_eq!(fx.store.writes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn load_roundtrips_the_last_written_position() {
        let fx = fixture();

        fx.tracker.on_tick(600_000, 1_200_000).await;
        assert_eq!(fx.tracker.load().await, 600_000);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_record_loads_zero() {
        let fx = fixture();

        fx.tracker.on_tick(1_150_000, 1_200_000).await;
        assert_eq!(fx.tracker.load().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ninety_percent_tick_flips_completed() {
        let fx = fixture();
        let duration = 1_200_000;

        // Ticks every 30 s of playback: 0, 30 s, 60 s, ... 1080 s (90%).
        for position in (0..=1_080_000).step_by(30_000) {
            fx.tracker.on_tick(position, duration).await;
            tokio::time::advance(Duration::from_secs(30)).await;
        }

        let record = fx
            .store
            .get(&UserId::from("viewer-1"), &ContentId::from("movie-1"))
            .await
            .unwrap()
            .expect("record exists");
        assert!(record.completed);
        assert_eq!(record.position_ms, 1_080_000);
    }

    #[tokio::test(start_paused = true)]
    async fn boundary_fraction_just_below_threshold_stays_incomplete() {
        let fx = fixture();

        fx.tracker.on_tick(1_079_999, 1_200_000).await;
        let record = fx
            .store
            .get(&UserId::from("viewer-1"), &ContentId::from("movie-1"))
            .await
            .unwrap()
            .expect("record exists");
        assert!(!record.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_ticks_are_ignored() {
        let fx = fixture();

        fx.tracker.on_tick(60_000, 0).await;
        assert_eq!(fx.store.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_load_falls_back_to_the_local_mirror() {
        let fx = fixture();

        fx.tracker.on_tick(600_000, 1_200_000).await;
        fx.store.set_offline(true);

        assert_eq!(fx.tracker.load().await, 600_000);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_wins_over_a_disagreeing_local_copy() {
        let fx = fixture();

        // Local copy from an earlier point in the film.
        let stale = ProgressRecord::at(
            ContentId::from("movie-1"),
            ContentKind::Movie,
            120_000,
            1_200_000,
        );
        fx.cache
            .set(
                "progress/viewer-1/movie-1",
                &serde_json::to_string(&stale).unwrap(),
            )
            .await
            .unwrap();

        // Remote copy from another device, further along.
        fx.store.seed(
            UserId::from("viewer-1"),
            ProgressRecord::at(
                ContentId::from("movie-1"),
                ContentKind::Movie,
                900_000,
                1_200_000,
            ),
        );

        assert_eq!(fx.tracker.load().await, 900_000);
        assert_eq!(fx.tracker.peek_local().await, Some(120_000));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_is_retried_after_the_interval() {
        let fx = fixture();
        fx.store.set_offline(true);

        fx.tracker.on_tick(60_000, 1_200_000).await;
        assert_eq!(fx.store.failed_writes(), 1);

        // Back online; the very next tick is still inside the hold-off.
        fx.store.set_offline(false);
        tokio::time::advance(Duration::from_secs(1)).await;
        fx.tracker.on_tick(61_000, 1_200_000).await;
        assert_eq!(fx.store.writes(), 0);

        tokio::time::advance(Duration::from_secs(30)).await;
        fx.tracker.on_tick(120_000, 1_200_000).await;
        assert_eq!(fx.store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_writes_still_reach_the_local_mirror() {
        let fx = fixture();
        fx.store.set_offline(true);

        fx.tracker.on_tick(600_000, 1_200_000).await;
        assert_eq!(fx.tracker.peek_local().await, Some(600_000));
    }

    #[tokio::test(start_paused = true)]
    async fn first_teardown_save_bypasses_the_delta_gate() {
        let fx = fixture();

        // No prior tick this session.
        fx.tracker.finish(2_000, 1_200_000, false).await;
        assert_eq!(fx.store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn negligible_teardown_delta_is_skipped() {
        let fx = fixture();

        fx.tracker.on_tick(600_000, 1_200_000).await;
        fx.tracker.finish(601_000, 1_200_000, false).await;
        assert_eq!(fx.store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn natural_end_pins_the_record_to_full_duration_once() {
        let fx = fixture();

        // Final regular tick lands just short of the boundary.
        fx.tracker.on_tick(1_079_000, 1_200_000).await;
        fx.tracker.finish(1_199_500, 1_200_000, true).await;
        fx.tracker.finish(1_199_500, 1_200_000, true).await;

        let record = fx
            .store
            .get(&UserId::from("viewer-1"), &ContentId::from("movie-1"))
            .await
            .unwrap()
            .expect("record exists");
        assert!(record.completed);
        assert_eq!(record.position_ms, 1_200_000);
        // One write for the tick, one for the pin; the second finish is a no-op.
        assert_eq!(fx.store.writes(), 2);
    }
}
