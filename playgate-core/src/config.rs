//! Tunables for the playback core.
//!
//! Every timing constant the subsystem depends on lives here so tests and
//! deployments can tighten or relax them without touching the components.
//! Values are plain millisecond integers in the file/environment and are
//! exposed as [`Duration`]s through accessors. The completion threshold is
//! deliberately *not* configurable: it must be identical on the write and
//! resume paths, so it is a model constant
//! ([`playgate_model::COMPLETION_THRESHOLD`]).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PlaybackError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Hard cap on one ad display attempt, in milliseconds
    pub ad_display_timeout_ms: u64,
    /// Load attempts for the very first preload of the slot
    pub ad_initial_preload_attempts: u32,
    /// Delay between initial preload attempts, in milliseconds
    pub ad_initial_preload_delay_ms: u64,
    /// Load attempts when refilling the slot after a show
    pub ad_refresh_preload_attempts: u32,
    /// Delay between refresh preload attempts, in milliseconds
    pub ad_refresh_preload_delay_ms: u64,
    /// Minimum interval between persisted progress ticks, in milliseconds
    pub progress_save_interval_ms: u64,
    /// Position deltas below this are not worth a write, in milliseconds
    pub progress_min_delta_ms: u64,
    /// Automatic media-error recoveries allowed per session
    pub media_fault_budget: u32,
    /// Pause before auto-starting the next item, in milliseconds
    pub up_next_grace_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            ad_display_timeout_ms: 15_000,
            ad_initial_preload_attempts: 3,
            ad_initial_preload_delay_ms: 1_000,
            ad_refresh_preload_attempts: 2,
            ad_refresh_preload_delay_ms: 500,
            progress_save_interval_ms: 30_000,
            progress_min_delta_ms: 5_000,
            media_fault_budget: 1,
            up_next_grace_ms: 2_000,
        }
    }
}

impl PlaybackConfig {
    /// Load from an optional `playgate.toml` in the working directory plus
    /// `PLAYGATE_`-prefixed environment overrides. Missing sources fall back
    /// to defaults.
    pub fn load() -> Result<Self> {
        Self::build(config::File::with_name("playgate").required(false))
    }

    /// Load from a specific file plus environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::build(config::File::from(path.to_path_buf()).required(true))
    }

    fn build(file: config::File<config::FileSourceFile, config::FileFormat>) -> Result<Self> {
        config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("PLAYGATE").try_parsing(true))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| PlaybackError::Config(e.to_string()))
    }

    pub fn ad_display_timeout(&self) -> Duration {
        Duration::from_millis(self.ad_display_timeout_ms)
    }

    pub fn ad_initial_preload_delay(&self) -> Duration {
        Duration::from_millis(self.ad_initial_preload_delay_ms)
    }

    pub fn ad_refresh_preload_delay(&self) -> Duration {
        Duration::from_millis(self.ad_refresh_preload_delay_ms)
    }

    pub fn progress_save_interval(&self) -> Duration {
        Duration::from_millis(self.progress_save_interval_ms)
    }

    pub fn up_next_grace(&self) -> Duration {
        Duration::from_millis(self.up_next_grace_ms)
    }
}
