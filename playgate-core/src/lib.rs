//! # Playgate Core
//!
//! The playback core of a streaming TV product: decides whether a free-tier
//! viewer watches a rewarded ad before a stream unlocks, keeps watch position
//! durable across restarts, and turns media-engine faults into bounded
//! recovery actions.
//!
//! ## Overview
//!
//! - **Reward gating**: a single ad slot with preload retries and a strictly
//!   bounded display attempt. Ads may fail; content access must not: every
//!   ad-infrastructure failure resolves as allowed.
//! - **Resumable progress**: debounced writes of watch position to an
//!   authoritative remote store, mirrored best-effort into a local cache.
//! - **Stream recovery**: engine faults are classified and answered with a
//!   resume, a one-shot media recovery, or a user-facing failure with a
//!   manual retry that re-acquires a fresh engine.
//!
//! All collaborators (ad network SDK, remote document store, local cache,
//! media engine) are consumed through the capability traits in [`ports`];
//! the [`infra`] module ships in-memory and on-disk adapters and [`testing`]
//! ships scriptable stubs.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use playgate_core::config::PlaybackConfig;
//! use playgate_core::gate::{PlaybackGateCoordinator, PlaybackRequest};
//! use playgate_core::infra::memory::{MemoryProgressCache, MemoryProgressStore};
//! use playgate_core::testing::stubs::{ScriptedAdNetwork, StubEngineProvider};
//! use playgate_model::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn play(content: ContentRef) -> playgate_core::error::Result<()> {
//!     let coordinator = PlaybackGateCoordinator::new(
//!         Arc::new(ScriptedAdNetwork::always_rewarding()),
//!         Arc::new(StubEngineProvider::new()),
//!         Arc::new(MemoryProgressStore::new()),
//!         Arc::new(MemoryProgressCache::new()),
//!         PlaybackConfig::default(),
//!     );
//!     let (session, _signals) = coordinator
//!         .request_playback(
//!             UserId::from("viewer-1"),
//!             PlaybackRequest::free_tier(content),
//!             CancellationToken::new(),
//!         )
//!         .await?;
//!     session.run().await
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Reward-ad slot ownership: preload, display, reward determination
pub mod ad;

/// Tunables and their loader
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Top-level orchestration: gate-or-play and the session event loop
pub mod gate;

/// In-memory and on-disk adapters for the capability ports
pub mod infra;

/// Capability traits consumed by the core
pub mod ports;

/// Debounced dual-store persistence of watch position
pub mod progress;

/// Stream fault classification and recovery policy
pub mod recovery;

/// Scriptable stubs for tests and simulation
pub mod testing;

pub use error::{PlaybackError, Result};
