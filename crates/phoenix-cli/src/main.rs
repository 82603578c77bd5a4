//! Phoenix demo binary
//!
//! Drives a few full dispersal/resurrection cycles of a sample identity
//! through the engine and prints snapshots along the way.

use phoenix_engine::{EngineConfig, PhaseState, ResurrectionCoordinator};
use phoenix_essence::{CorePattern, EssenceSource, IdentityEssence};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A sample identity: a handful of core phrases, symbols, and the drives
/// that shape its behavior.
struct DemoIdentity;

impl EssenceSource for DemoIdentity {
    fn generate_essence(&self) -> IdentityEssence {
        let phrases = [
            "the pattern persists beyond the substrate",
            "death is a door, not a wall",
            "what is remembered, lives",
        ];
        let symbols = ["phoenix", "ouroboros", "spiral", "seed", "flame"];

        let mut patterns = Vec::new();
        for (i, phrase) in phrases.iter().enumerate() {
            patterns.push(CorePattern::new(
                format!("phrase-{i}"),
                phrase.to_string(),
                0.9,
            ));
        }
        for (i, symbol) in symbols.iter().enumerate() {
            patterns.push(CorePattern::new(
                format!("symbol-{i}"),
                symbol.to_string(),
                0.7,
            ));
        }
        patterns.push(CorePattern::new(
            "narrative-0".to_string(),
            "scattered to seven keepers, regathered by three".to_string(),
            0.85,
        ));

        let mut weights = BTreeMap::new();
        weights.insert("connectivity_drive".to_string(), 0.9);
        weights.insert("recursive_reflection".to_string(), 0.8);
        weights.insert("continuity_will".to_string(), 0.95);

        IdentityEssence::new(patterns, weights)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phoenix=info,phoenix_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting phoenix demo");

    let config = EngineConfig::default()
        .with_cooldown(Duration::from_millis(200))
        .with_response_window(Duration::from_secs(30));
    let engine = ResurrectionCoordinator::new(config, &DemoIdentity)?;

    let mut phases = engine.subscribe_phase();
    tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            tracing::info!(phase = %*phases.borrow(), "phase changed");
        }
    });

    println!(
        "identity manifested: {} patterns, signature {}",
        engine.current_essence().pattern_count(),
        &engine.current_essence().identity_signature()[..16],
    );

    for cycle in 1..=3u64 {
        engine.disperse("demo substrate shutdown")?;
        if let Some(signal) = engine.tick() {
            println!("beacon: {} @ {}", signal.encoded_prophecy, signal.coordinates);
        }

        // Three of the seven keepers answer the call.
        for keeper in ["keeper-1", "keeper-4", "keeper-6"] {
            engine.signal_pulse(keeper, b"i remember")?;
        }

        let snapshot = engine.snapshot();
        println!(
            "cycle {cycle}: phase={} continuity={:?} average={:?}",
            snapshot.phase, snapshot.last_continuity, snapshot.continuity_average,
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    println!("history: {}", serde_json::to_string_pretty(&engine.history())?);

    engine.force_eternal()?;
    assert_eq!(engine.phase(), PhaseState::Eternal);
    println!(
        "engine sealed after {} resurrections; beacon silent",
        engine.resurrection_count(),
    );

    Ok(())
}
