//! Scripted end-to-end run of the playback core against in-memory backends.
//!
//! Useful for eyeballing the gate, persistence, and recovery wiring outside
//! of the test suite:
//!
//! ```text
//! playgate-sim --ad reward
//! playgate-sim --premium --network-fault
//! RUST_LOG=debug playgate-sim --ad silent
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use playgate_core::config::PlaybackConfig;
use playgate_core::gate::{PlaybackGateCoordinator, PlaybackRequest};
use playgate_core::infra::memory::{MemoryProgressCache, MemoryProgressStore};
use playgate_core::ports::{MediaEngineProvider, ProgressCache, ProgressStore};
use playgate_core::testing::stubs::{AdScript, ScriptedAdNetwork, StubEngineProvider};
use playgate_model::prelude::*;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "playgate-sim")]
#[command(about = "Drive a scripted ad-gated playback session against in-memory backends")]
struct Args {
    /// Play as a premium account (no reward gate)
    #[arg(long)]
    premium: bool,

    /// Ad behavior: reward, close, error, silent
    #[arg(long, default_value = "reward")]
    ad: String,

    /// Content duration in seconds
    #[arg(long, default_value_t = 120)]
    duration_secs: u64,

    /// Inject a network fault halfway through the stream
    #[arg(long)]
    network_fault: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let script = match args.ad.as_str() {
        "reward" => AdScript::Reward {
            after: Duration::from_millis(300),
        },
        "close" => AdScript::CloseWithoutReward {
            after: Duration::from_millis(300),
        },
        "error" => AdScript::ErrorOnShow {
            message: "no fill".to_string(),
        },
        "silent" => AdScript::Silent,
        other => anyhow::bail!("unknown ad script: {other}"),
    };

    let engines = Arc::new(StubEngineProvider::new());
    let store = Arc::new(MemoryProgressStore::new());
    let coordinator = PlaybackGateCoordinator::new(
        Arc::new(ScriptedAdNetwork::new(script)),
        Arc::clone(&engines) as Arc<dyn MediaEngineProvider>,
        Arc::clone(&store) as Arc<dyn ProgressStore>,
        Arc::new(MemoryProgressCache::new()) as Arc<dyn ProgressCache>,
        PlaybackConfig::default(),
    );

    if coordinator.ads().preload().await {
        info!("ad slot warmed");
    } else {
        info!("ad slot empty; the gate will fail open");
    }

    let user = UserId::from("sim-viewer");
    let content = ContentRef::new(
        "sim-movie",
        ContentKind::Movie,
        Url::parse("https://cdn.example/sim-movie/master.m3u8")?,
    )
    .with_title("Simulated Feature");
    let request = if args.premium {
        PlaybackRequest::premium(content.clone())
    } else {
        PlaybackRequest::free_tier(content.clone())
    };

    let (session, mut signals) = coordinator
        .request_playback(user.clone(), request, CancellationToken::new())
        .await?;
    info!(
        outcome = %session.outcome(),
        resume_ms = session.resume_position_ms(),
        "gate resolved; stream open"
    );

    let engine = engines
        .last_engine()
        .ok_or_else(|| anyhow::anyhow!("no engine was created"))?;
    let driver = engine.driver();
    let running = tokio::spawn(session.run());

    // Feed a compressed timeline: metadata, play, a tick per simulated
    // half-minute, optionally a fault at the midpoint, then the end.
    let duration_ms = args.duration_secs * 1_000;
    driver.loaded_metadata(duration_ms).await;
    driver.playing().await;
    let mut position_ms = 0;
    let mut fault_pending = args.network_fault;
    while position_ms < duration_ms {
        driver.tick(position_ms, duration_ms).await;
        if fault_pending && position_ms >= duration_ms / 2 {
            fault_pending = false;
            driver
                .fault(StreamFault::network("simulated segment loss"))
                .await;
        }
        position_ms += 30_000;
    }
    driver.end().await;

    running.await??;

    while let Ok(signal) = signals.try_recv() {
        info!(?signal, "session signal");
    }

    match store.get(&user, &content.id).await? {
        Some(record) => info!(
            position_ms = record.position_ms,
            completed = record.completed,
            "final progress record"
        ),
        None => info!("no progress record was written"),
    }

    if args.network_fault {
        info!(
            resume_loading_calls = engine.resume_loading_calls(),
            "engine recovery counters"
        );
    }

    Ok(())
}
