//! Convenience re-exports for downstream crates.

pub use crate::ad::{AdSlotState, FailOpenReason, RewardOutcome};
pub use crate::content::{ContentKind, ContentRef};
pub use crate::error::{ModelError, Result as ModelResult};
pub use crate::fault::{FaultClass, StreamFault};
pub use crate::ids::{ContentId, UserId};
pub use crate::progress::{COMPLETION_THRESHOLD, ProgressRecord, WatchProgress};
