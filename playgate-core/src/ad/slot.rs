//! The single reward-ad slot: one live instance at a time.

use playgate_model::AdSlotState;

use crate::error::{PlaybackError, Result};
use crate::ports::AdHandle;

/// Slot state plus the live instance, if any.
///
/// The slot never performs I/O itself; [`super::AdSessionManager`] drives the
/// lifecycle and the slot enforces that every step is a legal transition.
pub struct AdSlot {
    state: AdSlotState,
    handle: Option<Box<dyn AdHandle>>,
    load_attempts: u32,
}

impl std::fmt::Debug for AdSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdSlot")
            .field("state", &self.state)
            .field("has_handle", &self.handle.is_some())
            .field("load_attempts", &self.load_attempts)
            .finish()
    }
}

impl Default for AdSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl AdSlot {
    pub fn new() -> Self {
        Self {
            state: AdSlotState::Empty,
            handle: None,
            load_attempts: 0,
        }
    }

    pub fn state(&self) -> AdSlotState {
        self.state
    }

    pub fn load_attempts(&self) -> u32 {
        self.load_attempts
    }

    /// True iff an instance exists and reports itself loaded.
    pub fn is_ready(&self) -> bool {
        self.state == AdSlotState::Ready
            && self.handle.as_ref().is_some_and(|h| h.is_loaded())
    }

    fn transition(&mut self, next: AdSlotState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(PlaybackError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Enter `Loading` from any restable state (empty, closed, failed).
    pub fn begin_load(&mut self) -> Result<()> {
        self.transition(AdSlotState::Loading)
    }

    /// Record one load attempt against the current load cycle.
    pub fn note_attempt(&mut self) {
        self.load_attempts += 1;
    }

    /// Install a loaded instance. Resets the attempt counter.
    pub fn loaded(&mut self, handle: Box<dyn AdHandle>) -> Result<()> {
        self.transition(AdSlotState::Ready)?;
        self.handle = Some(handle);
        self.load_attempts = 0;
        Ok(())
    }

    /// Park the slot in `Failed`; only another load cycle recovers it.
    pub fn load_failed(&mut self) {
        // Always legal.
        self.state = AdSlotState::Failed;
        self.handle = None;
    }

    /// Consume the instance for display. The handle leaves the slot; the
    /// slot keeps tracking the lifecycle of the showing.
    pub fn take_for_show(&mut self) -> Result<Box<dyn AdHandle>> {
        if !self.is_ready() {
            return Err(PlaybackError::AdNetwork(format!(
                "no displayable ad instance (slot is {})",
                self.state
            )));
        }
        self.transition(AdSlotState::Showing)?;
        self.handle
            .take()
            .ok_or_else(|| PlaybackError::Internal("ready slot without handle".to_string()))
    }

    /// The showing produced a reward, then closed.
    pub fn reward_earned(&mut self) -> Result<()> {
        self.transition(AdSlotState::Rewarded)?;
        self.transition(AdSlotState::Closed)
    }

    /// The showing concluded without a reward.
    pub fn close(&mut self) -> Result<()> {
        self.transition(AdSlotState::Closed)
    }
}
