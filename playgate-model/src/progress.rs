//! Watch position and completion tracking for playable content.
//!
//! Progress is tracked as position/duration per (user, content) pair and
//! persisted in two places: an authoritative remote record and a local
//! fast-path cache. The same completion boundary is applied in both
//! directions: a record at or past [`COMPLETION_THRESHOLD`] is written as
//! completed, and a completed record never offers a resume position.

use crate::content::ContentKind;
use crate::ids::ContentId;

/// Watched fraction at or above which an item counts as finished.
pub const COMPLETION_THRESHOLD: f64 = 0.9;

/// Watch progress fraction, clamped to [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchProgress(f64);

impl WatchProgress {
    /// Create a new watch progress, clamping between 0.0 and 1.0
    pub fn new(progress: f64) -> Self {
        WatchProgress(progress.clamp(0.0, 1.0))
    }

    /// Compute the fraction for a position/duration pair.
    ///
    /// A zero duration yields 0.0; such a pair carries no information.
    pub fn of(position_ms: u64, duration_ms: u64) -> Self {
        if duration_ms == 0 {
            return WatchProgress(0.0);
        }
        WatchProgress::new(position_ms as f64 / duration_ms as f64)
    }

    /// Get the progress as a fraction (0.0 to 1.0)
    pub fn as_fraction(&self) -> f64 {
        self.0
    }

    /// Check if this progress is past the completion boundary
    pub fn is_completed(&self) -> bool {
        self.0 >= COMPLETION_THRESHOLD
    }

    /// Check if this item has been started
    pub fn is_started(&self) -> bool {
        self.0 > 0.0
    }
}

/// Persisted watch position for one (user, content) pair.
///
/// The remote copy is the source of truth across devices; the local copy is
/// an opportunistic cache. Records are created on the first accepted tick of
/// a session, mutated on every later one, and never deleted here (clearing
/// history is an account-surface operation).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressRecord {
    pub content_id: ContentId,
    pub kind: ContentKind,
    /// Playback position in milliseconds
    pub position_ms: u64,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    pub completed: bool,
    /// Unix timestamp in milliseconds of the last update
    pub updated_at: i64,
}

impl ProgressRecord {
    /// Build a record for the given position, deriving `completed`.
    pub fn at(
        content_id: ContentId,
        kind: ContentKind,
        position_ms: u64,
        duration_ms: u64,
    ) -> Self {
        let completed = WatchProgress::of(position_ms, duration_ms).is_completed();
        Self {
            content_id,
            kind,
            position_ms,
            duration_ms,
            completed,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn progress(&self) -> WatchProgress {
        WatchProgress::of(self.position_ms, self.duration_ms)
    }

    /// Where playback should resume for this record: the stored position for
    /// a record still in progress, 0 for anything completed or past the
    /// completion boundary.
    pub fn resume_position_ms(&self) -> u64 {
        if self.completed || self.progress().is_completed() {
            0
        } else {
            self.position_ms
        }
    }
}
