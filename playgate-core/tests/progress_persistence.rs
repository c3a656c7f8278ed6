//! Dual-store persistence scenarios: restarts, offline operation, and the
//! on-disk local cache.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use playgate_core::config::PlaybackConfig;
use playgate_core::infra::disk::DiskProgressCache;
use playgate_core::infra::memory::{MemoryProgressCache, MemoryProgressStore};
use playgate_core::ports::{ProgressCache, ProgressStore};
use playgate_core::progress::PlaybackProgressTracker;
use playgate_core::testing::stubs::FlakyProgressStore;
use playgate_model::prelude::*;

fn content(id: &str) -> ContentRef {
    ContentRef::new(
        id,
        ContentKind::Movie,
        Url::parse(&format!("https://cdn.example/{id}/master.m3u8")).expect("url"),
    )
}

fn tracker(
    store: Arc<dyn ProgressStore>,
    cache: Arc<dyn ProgressCache>,
    content_ref: &ContentRef,
) -> PlaybackProgressTracker {
    PlaybackProgressTracker::new(
        UserId::from("viewer-1"),
        content_ref,
        store,
        cache,
        PlaybackConfig::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn resume_survives_a_process_restart_through_the_remote_store() {
    let store = Arc::new(MemoryProgressStore::new());
    let movie = content("movie-1");

    // First run of the app.
    {
        let t = tracker(
            Arc::clone(&store) as Arc<dyn ProgressStore>,
            Arc::new(MemoryProgressCache::new()),
            &movie,
        );
        t.on_tick(600_000, 1_200_000).await;
    }

    // Fresh process: new tracker, empty local cache, same remote.
    let t = tracker(
        Arc::clone(&store) as Arc<dyn ProgressStore>,
        Arc::new(MemoryProgressCache::new()),
        &movie,
    );
    assert_eq!(t.load().await, 600_000);
}

#[tokio::test(start_paused = true)]
async fn resume_survives_a_restart_offline_through_the_disk_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(FlakyProgressStore::new());
    let movie = content("movie-1");

    // Online session writes through to disk.
    {
        let cache = Arc::new(DiskProgressCache::open_at(dir.path()).expect("open cache"));
        let t = tracker(
            Arc::clone(&store) as Arc<dyn ProgressStore>,
            cache as Arc<dyn ProgressCache>,
            &movie,
        );
        t.on_tick(450_000, 1_200_000).await;
    }

    // Fresh process with no connectivity: the disk copy answers.
    store.set_offline(true);
    let cache = Arc::new(DiskProgressCache::open_at(dir.path()).expect("reopen cache"));
    let t = tracker(
        Arc::clone(&store) as Arc<dyn ProgressStore>,
        cache as Arc<dyn ProgressCache>,
        &movie,
    );
    assert_eq!(t.load().await, 450_000);
}

#[tokio::test(start_paused = true)]
async fn the_remote_answer_wins_over_a_stale_disk_copy() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(FlakyProgressStore::new());
    let movie = content("movie-1");

    let cache = Arc::new(DiskProgressCache::open_at(dir.path()).expect("open cache"));
    let t = tracker(
        Arc::clone(&store) as Arc<dyn ProgressStore>,
        Arc::clone(&cache) as Arc<dyn ProgressCache>,
        &movie,
    );
    t.on_tick(120_000, 1_200_000).await;

    // Another device got further; its write reached the remote only.
    store.seed(
        UserId::from("viewer-1"),
        ProgressRecord::at(
            ContentId::from("movie-1"),
            ContentKind::Movie,
            900_000,
            1_200_000,
        ),
    );

    assert_eq!(t.load().await, 900_000);
    // The fast-path copy still shows the stale position until the next write.
    assert_eq!(t.peek_local().await, Some(120_000));
}

#[tokio::test(start_paused = true)]
async fn an_offline_session_keeps_its_place_locally() {
    let store = Arc::new(FlakyProgressStore::new());
    let cache = Arc::new(MemoryProgressCache::new());
    let movie = content("movie-1");
    store.set_offline(true);

    let t = tracker(
        Arc::clone(&store) as Arc<dyn ProgressStore>,
        Arc::clone(&cache) as Arc<dyn ProgressCache>,
        &movie,
    );
    t.on_tick(240_000, 1_200_000).await;
    tokio::time::advance(Duration::from_secs(31)).await;
    t.on_tick(480_000, 1_200_000).await;

    assert_eq!(store.writes(), 0);
    assert_eq!(store.failed_writes(), 2);
    assert_eq!(t.load().await, 480_000);
}

#[tokio::test(start_paused = true)]
async fn continue_watching_surfaces_recent_in_progress_items() {
    let store = MemoryProgressStore::new();
    let user = UserId::from("viewer-1");

    store.insert(
        user.clone(),
        ProgressRecord::at(ContentId::from("movie-a"), ContentKind::Movie, 300_000, 1_200_000),
    );
    store.insert(
        user.clone(),
        ProgressRecord::at(ContentId::from("ep-b"), ContentKind::Episode, 600_000, 900_000),
    );
    store.insert(
        user.clone(),
        ProgressRecord::at(ContentId::from("done-c"), ContentKind::Movie, 1_150_000, 1_200_000),
    );

    let items = store.continue_watching(&user, 10).await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|r| !r.completed));
}
