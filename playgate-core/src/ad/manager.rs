//! Reward determination with bounded latency and bounded retries.
//!
//! The manager owns the one [`AdSlot`] and answers a single question per
//! playback attempt: did the viewer earn the reward? The guiding invariant
//! is **ads may fail; content access must not**: every infrastructure
//! failure (no instance, load failure, display error, timeout) resolves as
//! allowed, and the caller is never blocked past the display timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use playgate_model::{AdSlotState, FailOpenReason, RewardOutcome};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ad::slot::AdSlot;
use crate::config::PlaybackConfig;
use crate::error::Result;
use crate::ports::{AdEvent, AdHandle, AdNetwork};

/// Clonable handle to the single shared ad slot. Clones share state.
#[derive(Clone)]
pub struct AdSessionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    network: Arc<dyn AdNetwork>,
    config: PlaybackConfig,
    slot: Mutex<AdSlot>,
    preloaded_once: AtomicBool,
}

impl std::fmt::Debug for AdSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdSessionManager")
            .field(
                "preloaded_once",
                &self.inner.preloaded_once.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

impl AdSessionManager {
    pub fn new(network: Arc<dyn AdNetwork>, config: PlaybackConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                network,
                config,
                slot: Mutex::new(AdSlot::new()),
                preloaded_once: AtomicBool::new(false),
            }),
        }
    }

    /// Request and load a fresh ad instance.
    ///
    /// The first load cycle of the manager gets the larger attempt budget;
    /// refills after a show get the smaller one. Attempts are strictly
    /// sequential with a fixed delay between them. Returns whether an
    /// instance is now ready; failure only means no ad will be instantly
    /// available at the next gate.
    pub async fn preload(&self) -> bool {
        let mut slot = self.inner.slot.lock().await;
        self.inner.preload_slot(&mut slot).await
    }

    /// Pure query: an instance exists and reports itself loaded.
    ///
    /// False while the slot is busy loading or showing.
    pub fn is_ready(&self) -> bool {
        self.inner
            .slot
            .try_lock()
            .map(|slot| slot.is_ready())
            .unwrap_or(false)
    }

    pub async fn slot_state(&self) -> AdSlotState {
        self.inner.slot.lock().await.state()
    }

    /// Resolve one playback attempt's reward.
    ///
    /// If no instance is ready the answer is an immediate fail-open grant;
    /// no network waits on this path. Otherwise the loaded instance is shown
    /// and three outcomes race: the ad's own reward/closed/error event, the
    /// fixed display timeout, and the viewer's skip signal. Exactly one
    /// resolution is observed; the event stream is dropped with the race, so
    /// a late event cannot change a decision already acted upon.
    ///
    /// A second concurrent call finds the slot busy and fails open rather
    /// than doubling up on the single instance. After every attempt a
    /// background task starts preloading the replacement, independent of the
    /// caller.
    pub async fn acquire_reward(&self, skip: CancellationToken) -> RewardOutcome {
        let Ok(mut slot) = self.inner.slot.try_lock() else {
            debug!("ad slot busy; granting access");
            return RewardOutcome::FailOpen(FailOpenReason::NoAdAvailable);
        };

        if !slot.is_ready() {
            debug!(state = %slot.state(), "no ad instance ready; granting access");
            drop(slot);
            self.spawn_preload();
            return RewardOutcome::FailOpen(FailOpenReason::NoAdAvailable);
        }

        let mut handle = match slot.take_for_show() {
            Ok(handle) => handle,
            Err(err) => {
                warn!(error = %err, "ad instance unavailable at show time; granting access");
                drop(slot);
                self.spawn_preload();
                return RewardOutcome::FailOpen(FailOpenReason::NoAdAvailable);
            }
        };

        let outcome = match handle.show() {
            Ok(events) => self.inner.settle_showing(events, skip).await,
            Err(err) => {
                warn!(error = %err, "ad display failed; granting access");
                RewardOutcome::FailOpen(FailOpenReason::AdError)
            }
        };

        // The instance is consumed no matter how the showing ended.
        let bookkeeping = if outcome.is_rewarded() {
            slot.reward_earned()
        } else {
            slot.close()
        };
        if let Err(err) = bookkeeping {
            warn!(error = %err, "ad slot bookkeeping failed");
            slot.load_failed();
        }
        drop(slot);
        drop(handle);

        self.spawn_preload();
        info!(outcome = %outcome, "reward attempt settled");
        outcome
    }

    fn spawn_preload(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut slot = inner.slot.lock().await;
            if !inner.preload_slot(&mut slot).await {
                debug!("background ad preload failed; the next gate will fail open");
            }
        });
    }
}

impl ManagerInner {
    async fn settle_showing(
        &self,
        mut events: mpsc::Receiver<AdEvent>,
        skip: CancellationToken,
    ) -> RewardOutcome {
        tokio::select! {
            _ = skip.cancelled() => {
                info!("viewer declined the ad");
                RewardOutcome::Declined
            }
            event = events.recv() => match event {
                Some(AdEvent::Reward) => RewardOutcome::Earned,
                Some(AdEvent::Closed) => {
                    debug!("ad closed before any reward event");
                    RewardOutcome::Declined
                }
                Some(AdEvent::Error(message)) => {
                    warn!(error = %message, "ad errored during display; granting access");
                    RewardOutcome::FailOpen(FailOpenReason::AdError)
                }
                None => {
                    warn!("ad event stream ended without an outcome; granting access");
                    RewardOutcome::FailOpen(FailOpenReason::AdError)
                }
            },
            _ = tokio::time::sleep(self.config.ad_display_timeout()) => {
                warn!(
                    timeout_ms = self.config.ad_display_timeout_ms,
                    "ad produced no outcome within the display timeout; granting access"
                );
                RewardOutcome::FailOpen(FailOpenReason::Timeout)
            }
        }
    }

    async fn preload_slot(&self, slot: &mut AdSlot) -> bool {
        if slot.is_ready() {
            return true;
        }

        let (attempts, delay) = if self.preloaded_once.swap(true, Ordering::SeqCst) {
            (
                self.config.ad_refresh_preload_attempts,
                self.config.ad_refresh_preload_delay(),
            )
        } else {
            (
                self.config.ad_initial_preload_attempts,
                self.config.ad_initial_preload_delay(),
            )
        };

        if slot.begin_load().is_err() {
            // A Ready slot whose instance went stale lands here; discard the
            // instance and restart the cycle.
            slot.load_failed();
            if slot.begin_load().is_err() {
                return false;
            }
        }

        for attempt in 1..=attempts {
            slot.note_attempt();
            match self.create_and_load().await {
                Ok(handle) => {
                    if let Err(err) = slot.loaded(handle) {
                        warn!(error = %err, "could not install loaded ad instance");
                        slot.load_failed();
                        return false;
                    }
                    info!(attempt, "ad instance ready");
                    return true;
                }
                Err(err) => {
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "ad preload attempt failed"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        slot.load_failed();
        false
    }

    async fn create_and_load(&self) -> Result<Box<dyn AdHandle>> {
        let mut handle = self.network.create().await?;
        handle.load().await?;
        Ok(handle)
    }
}
