//! Scriptable stubs for the ad network, media engine, and progress store.
//!
//! Tests and the simulation binary drive these to produce any ad outcome,
//! engine timeline, or store failure without real collaborators.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use playgate_model::{ContentId, ProgressRecord, StreamFault, UserId};
use tokio::sync::{Mutex, mpsc};
use url::Url;

use crate::error::{PlaybackError, Result};
use crate::infra::memory::MemoryProgressStore;
use crate::ports::{
    AdEvent, AdHandle, AdNetwork, EngineEvent, MediaEngine, MediaEngineProvider,
    ProgressStore,
};

/// What a scripted ad instance does once shown.
#[derive(Debug, Clone)]
pub enum AdScript {
    /// Fire the reward event after a delay, then close
    Reward { after: Duration },
    /// Close after a delay without ever rewarding
    CloseWithoutReward { after: Duration },
    /// Fail immediately on display
    ErrorOnShow { message: String },
    /// Never fire any event; only the timeout or a skip can settle the race
    Silent,
}

#[derive(Debug)]
struct AdNetInner {
    script: RwLock<AdScript>,
    pending_load_failures: AtomicU32,
    created: AtomicU32,
    load_calls: AtomicU32,
}

/// Scriptable ad network. Clones share state, so tests can keep a handle
/// after moving the network into a manager.
#[derive(Debug, Clone)]
pub struct ScriptedAdNetwork {
    inner: Arc<AdNetInner>,
}

impl ScriptedAdNetwork {
    pub fn new(script: AdScript) -> Self {
        Self {
            inner: Arc::new(AdNetInner {
                script: RwLock::new(script),
                pending_load_failures: AtomicU32::new(0),
                created: AtomicU32::new(0),
                load_calls: AtomicU32::new(0),
            }),
        }
    }

    pub fn always_rewarding() -> Self {
        Self::new(AdScript::Reward {
            after: Duration::from_millis(100),
        })
    }

    pub fn silent() -> Self {
        Self::new(AdScript::Silent)
    }

    pub fn set_script(&self, script: AdScript) {
        *self.inner.script.write().expect("script lock") = script;
    }

    /// Make the next `count` load calls fail.
    pub fn fail_next_loads(&self, count: u32) {
        self.inner
            .pending_load_failures
            .store(count, Ordering::SeqCst);
    }

    pub fn created(&self) -> u32 {
        self.inner.created.load(Ordering::SeqCst)
    }

    pub fn load_calls(&self) -> u32 {
        self.inner.load_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdNetwork for ScriptedAdNetwork {
    async fn create(&self) -> Result<Box<dyn AdHandle>> {
        self.inner.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedAdHandle {
            inner: Arc::clone(&self.inner),
            loaded: false,
        }))
    }
}

struct ScriptedAdHandle {
    inner: Arc<AdNetInner>,
    loaded: bool,
}

impl ScriptedAdHandle {
    fn take_load_failure(&self) -> bool {
        self.inner
            .pending_load_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl AdHandle for ScriptedAdHandle {
    async fn load(&mut self) -> Result<()> {
        self.inner.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_load_failure() {
            return Err(PlaybackError::AdNetwork(
                "scripted ad load failure".to_string(),
            ));
        }
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn show(&mut self) -> Result<mpsc::Receiver<AdEvent>> {
        if !self.loaded {
            return Err(PlaybackError::AdNetwork(
                "show called on an unloaded ad".to_string(),
            ));
        }
        self.loaded = false;

        let script = self.inner.script.read().expect("script lock").clone();
        let (tx, rx) = mpsc::channel(4);
        match script {
            AdScript::Reward { after } => {
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(AdEvent::Reward).await;
                    let _ = tx.send(AdEvent::Closed).await;
                });
            }
            AdScript::CloseWithoutReward { after } => {
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(AdEvent::Closed).await;
                });
            }
            AdScript::ErrorOnShow { message } => {
                tokio::spawn(async move {
                    let _ = tx.send(AdEvent::Error(message)).await;
                });
            }
            AdScript::Silent => {
                // Keep the sender alive so the stream stays open without
                // ever producing an event.
                tokio::spawn(async move {
                    let _keep = tx;
                    futures::future::pending::<()>().await;
                });
            }
        }
        Ok(rx)
    }
}

#[derive(Debug)]
struct EngineInner {
    events_tx: StdMutex<Option<mpsc::Sender<EngineEvent>>>,
    events_rx: Mutex<Option<mpsc::Receiver<EngineEvent>>>,
    opens: StdMutex<Vec<(Url, u64)>>,
    seeks: StdMutex<Vec<u64>>,
    resume_loading_calls: AtomicU32,
    recover_media_calls: AtomicU32,
    shut_down: AtomicBool,
}

/// Media engine whose event timeline is driven from the outside via
/// [`EngineDriver`]. Records every call for assertions.
#[derive(Debug)]
pub struct ScriptedMediaEngine {
    inner: Arc<EngineInner>,
}

impl Default for ScriptedMediaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedMediaEngine {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            inner: Arc::new(EngineInner {
                events_tx: StdMutex::new(Some(tx)),
                events_rx: Mutex::new(Some(rx)),
                opens: StdMutex::new(Vec::new()),
                seeks: StdMutex::new(Vec::new()),
                resume_loading_calls: AtomicU32::new(0),
                recover_media_calls: AtomicU32::new(0),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn driver(&self) -> EngineDriver {
        EngineDriver {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn opens(&self) -> Vec<(Url, u64)> {
        self.inner.opens.lock().expect("opens lock").clone()
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.inner.seeks.lock().expect("seeks lock").clone()
    }

    pub fn resume_loading_calls(&self) -> u32 {
        self.inner.resume_loading_calls.load(Ordering::SeqCst)
    }

    pub fn recover_media_calls(&self) -> u32 {
        self.inner.recover_media_calls.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaEngine for ScriptedMediaEngine {
    async fn open(&self, source: &Url, resume_position_ms: u64) -> Result<()> {
        if self.is_shut_down() {
            return Err(PlaybackError::Engine("engine released".to_string()));
        }
        self.inner
            .opens
            .lock()
            .expect("opens lock")
            .push((source.clone(), resume_position_ms));
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        self.inner.seeks.lock().expect("seeks lock").push(position_ms);
        Ok(())
    }

    async fn resume_loading(&self) -> Result<()> {
        self.inner.resume_loading_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn recover_media(&self) -> Result<()> {
        self.inner.recover_media_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        // Closing the sender ends the event stream.
        self.inner.events_tx.lock().expect("events lock").take();
        Ok(())
    }

    async fn take_events(&self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.inner.events_rx.lock().await.take()
    }
}

/// Injection handle for a [`ScriptedMediaEngine`]'s event stream.
#[derive(Debug, Clone)]
pub struct EngineDriver {
    inner: Arc<EngineInner>,
}

impl EngineDriver {
    async fn send(&self, event: EngineEvent) -> bool {
        let tx = self.inner.events_tx.lock().expect("events lock").clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub async fn tick(&self, position_ms: u64, duration_ms: u64) -> bool {
        self.send(EngineEvent::TimeUpdate {
            position_ms,
            duration_ms,
        })
        .await
    }

    pub async fn loaded_metadata(&self, duration_ms: u64) -> bool {
        self.send(EngineEvent::LoadedMetadata { duration_ms }).await
    }

    pub async fn buffering(&self, active: bool) -> bool {
        self.send(EngineEvent::Buffering(active)).await
    }

    pub async fn playing(&self) -> bool {
        self.send(EngineEvent::Playing).await
    }

    pub async fn fault(&self, fault: StreamFault) -> bool {
        self.send(EngineEvent::Fault(fault)).await
    }

    pub async fn end(&self) -> bool {
        self.send(EngineEvent::Ended).await
    }
}

/// Provider that mints [`ScriptedMediaEngine`]s and remembers them so tests
/// can reach each instance's driver and counters.
#[derive(Debug, Default)]
pub struct StubEngineProvider {
    engines: StdMutex<Vec<Arc<ScriptedMediaEngine>>>,
}

impl StubEngineProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.engines.lock().expect("engines lock").len()
    }

    pub fn engine(&self, index: usize) -> Option<Arc<ScriptedMediaEngine>> {
        self.engines.lock().expect("engines lock").get(index).cloned()
    }

    pub fn last_engine(&self) -> Option<Arc<ScriptedMediaEngine>> {
        self.engines.lock().expect("engines lock").last().cloned()
    }
}

#[async_trait]
impl MediaEngineProvider for StubEngineProvider {
    async fn create(&self) -> Result<Arc<dyn MediaEngine>> {
        let engine = Arc::new(ScriptedMediaEngine::new());
        self.engines
            .lock()
            .expect("engines lock")
            .push(Arc::clone(&engine));
        Ok(engine)
    }
}

/// Progress store with a switchable offline mode and write counters,
/// wrapping the in-memory adapter.
#[derive(Debug, Default)]
pub struct FlakyProgressStore {
    inner: MemoryProgressStore,
    offline: AtomicBool,
    writes: AtomicU32,
    failed_writes: AtomicU32,
}

impl FlakyProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn failed_writes(&self) -> u32 {
        self.failed_writes.load(Ordering::SeqCst)
    }

    /// Seed a record directly, bypassing the offline switch.
    pub fn seed(&self, user: UserId, record: ProgressRecord) {
        self.inner.insert(user, record);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PlaybackError::Store("store unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for FlakyProgressStore {
    async fn get(
        &self,
        user: &UserId,
        content: &ContentId,
    ) -> Result<Option<ProgressRecord>> {
        self.check_online()?;
        self.inner.get(user, content).await
    }

    async fn upsert_merge(&self, user: &UserId, record: &ProgressRecord) -> Result<()> {
        if let Err(err) = self.check_online() {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            return Err(err);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_merge(user, record).await
    }

    async fn continue_watching(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ProgressRecord>> {
        self.check_online()?;
        self.inner.continue_watching(user, limit).await
    }
}
