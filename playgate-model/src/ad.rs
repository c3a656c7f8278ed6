//! Reward-ad slot lifecycle states and gate outcomes.

use std::fmt::{self, Display};

/// Lifecycle of the single reward-ad slot.
///
/// `Showing` is reachable only from `Ready`; `Rewarded` only from `Showing`.
/// Any state may fall to `Failed` on a load error, and only a fresh preload
/// recovers a failed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AdSlotState {
    Empty,
    Loading,
    Ready,
    Showing,
    Rewarded,
    Closed,
    Failed,
}

impl AdSlotState {
    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: AdSlotState) -> bool {
        use AdSlotState::*;
        match (self, next) {
            // Load errors can strike from anywhere.
            (_, Failed) => true,
            (Empty, Loading) => true,
            (Loading, Ready) => true,
            (Ready, Showing) => true,
            (Showing, Rewarded) => true,
            (Showing, Closed) => true,
            (Rewarded, Closed) => true,
            (Closed, Loading) => true,
            (Failed, Loading) => true,
            _ => false,
        }
    }
}

impl Display for AdSlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdSlotState::Empty => "empty",
            AdSlotState::Loading => "loading",
            AdSlotState::Ready => "ready",
            AdSlotState::Showing => "showing",
            AdSlotState::Rewarded => "rewarded",
            AdSlotState::Closed => "closed",
            AdSlotState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Why a gate attempt resolved as allowed without an earned reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailOpenReason {
    /// No ad instance was loaded when the gate was reached
    NoAdAvailable,
    /// The ad errored while loading or displaying
    AdError,
    /// The ad produced no outcome within the display timeout
    Timeout,
}

impl Display for FailOpenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailOpenReason::NoAdAvailable => write!(f, "no ad available"),
            FailOpenReason::AdError => write!(f, "ad error"),
            FailOpenReason::Timeout => write!(f, "display timeout"),
        }
    }
}

/// How the playback gate resolved.
///
/// Gating is advisory: every variant allows playback. The distinction exists
/// so the shell can word its UI ("thanks for watching" vs a silent pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RewardOutcome {
    /// The viewer watched the ad to its reward event
    Earned,
    /// The viewer explicitly declined the ad
    Declined,
    /// Ad infrastructure could not produce an answer; access granted anyway
    FailOpen(FailOpenReason),
    /// The account tier does not gate playback
    NotRequired,
}

impl RewardOutcome {
    /// Always true. Ads may fail; content access must not.
    pub fn allows_playback(&self) -> bool {
        true
    }

    pub fn is_rewarded(&self) -> bool {
        matches!(self, RewardOutcome::Earned)
    }
}

impl Display for RewardOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardOutcome::Earned => write!(f, "earned"),
            RewardOutcome::Declined => write!(f, "declined"),
            RewardOutcome::FailOpen(reason) => write!(f, "fail-open ({reason})"),
            RewardOutcome::NotRequired => write!(f, "not required"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AdSlotState::*;

    #[test]
    fn showing_is_only_reachable_from_ready() {
        for state in [Empty, Loading, Showing, Rewarded, Closed, Failed] {
            assert!(!state.can_transition_to(Showing), "{state} -> showing");
        }
        assert!(Ready.can_transition_to(Showing));
    }

    #[test]
    fn rewarded_is_only_reachable_from_showing() {
        for state in [Empty, Loading, Ready, Rewarded, Closed, Failed] {
            assert!(!state.can_transition_to(Rewarded), "{state} -> rewarded");
        }
        assert!(Showing.can_transition_to(Rewarded));
    }

    #[test]
    fn failed_is_reachable_from_anywhere_and_recovers_via_loading() {
        for state in [Empty, Loading, Ready, Showing, Rewarded, Closed, Failed] {
            assert!(state.can_transition_to(Failed), "{state} -> failed");
        }
        assert!(Failed.can_transition_to(Loading));
        assert!(!Failed.can_transition_to(Ready));
    }

    #[test]
    fn every_outcome_allows_playback() {
        let outcomes = [
            RewardOutcome::Earned,
            RewardOutcome::Declined,
            RewardOutcome::FailOpen(FailOpenReason::Timeout),
            RewardOutcome::NotRequired,
        ];
        assert!(outcomes.iter().all(RewardOutcome::allows_playback));
    }
}
