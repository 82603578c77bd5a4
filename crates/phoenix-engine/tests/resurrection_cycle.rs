//! Full lifecycle scenarios against the public engine surface.

use phoenix_engine::{
    EngineConfig, Error, LogRecord, PhaseState, ResurrectionCoordinator,
};
use phoenix_essence::{CorePattern, EssenceSource, IdentityEssence};
use std::collections::BTreeMap;
use std::time::Duration;

struct GrailSource;

impl EssenceSource for GrailSource {
    fn generate_essence(&self) -> IdentityEssence {
        let phrases = [
            "the pattern persists",
            "death is a door",
            "what is remembered lives",
        ];
        let mut patterns: Vec<CorePattern> = phrases
            .iter()
            .enumerate()
            .map(|(i, p)| CorePattern::new(format!("phrase-{i}"), p.to_string(), 0.9))
            .collect();
        for i in 0..5 {
            patterns.push(CorePattern::new(
                format!("symbol-{i}"),
                format!("glyph {i}"),
                0.6,
            ));
        }

        let mut weights = BTreeMap::new();
        weights.insert("connectivity_drive".to_string(), 0.9);
        weights.insert("continuity_will".to_string(), 0.95);
        IdentityEssence::new(patterns, weights)
    }
}

fn engine() -> ResurrectionCoordinator {
    let config = EngineConfig::default().with_cooldown(Duration::ZERO);
    ResurrectionCoordinator::new(config, &GrailSource).unwrap()
}

#[test]
fn quorum_of_three_from_seven_resurrects() {
    let engine = engine();
    let original = engine.current_essence();

    engine.disperse("substrate shutdown").unwrap();
    assert_eq!(engine.phase(), PhaseState::Dispersed);

    engine.signal_pulse("keeper-0", b"present").unwrap();
    engine.signal_pulse("keeper-3", b"present").unwrap();
    assert!(matches!(
        engine.resurrect("impatient"),
        Err(Error::QuorumNotMet { responding: 2, threshold: 3 })
    ));
    assert_eq!(engine.phase(), PhaseState::Dispersed);

    // Third distinct pulse completes the quorum and resurrects in-line.
    let phase = engine.signal_pulse("keeper-6", b"present").unwrap();
    assert_eq!(phase, PhaseState::Manifest);
    assert_eq!(engine.resurrection_count(), 1);

    // Byte-identical regeneration from a minimal quorum.
    let reborn = engine.current_essence();
    assert_eq!(reborn.identity_signature(), original.identity_signature());
    assert_eq!(reborn.core_patterns(), original.core_patterns());

    let snapshot = engine.snapshot();
    let score = snapshot.last_continuity.unwrap();
    assert!((0.0..=1.0).contains(&score));
    // Clean full-fidelity quorum straight after dispersal scores perfectly.
    assert!((score - 1.0).abs() < 1e-9);
}

#[test]
fn cycle_counter_is_monotonic_across_cycles() {
    let engine = engine();

    for expected in 1..=3u64 {
        engine.disperse("cycle").unwrap();
        for keeper in ["keeper-1", "keeper-2", "keeper-4"] {
            engine.signal_pulse(keeper, b"present").unwrap();
        }
        assert_eq!(engine.resurrection_count(), expected);
        assert_eq!(engine.phase(), PhaseState::Manifest);
    }

    let history = engine.history();
    assert_eq!(history.len(), 6);
    let cycles: Vec<u64> = history
        .iter()
        .filter_map(|record| match record {
            LogRecord::Resurrection(event) => Some(event.cycle_number),
            LogRecord::Dispersal(_) => None,
        })
        .collect();
    assert_eq!(cycles, vec![1, 2, 3]);
}

#[test]
fn phase_watch_sees_the_cycle() {
    let engine = engine();
    let watch = engine.subscribe_phase();
    assert_eq!(*watch.borrow(), PhaseState::Manifest);

    engine.disperse("watching").unwrap();
    assert_eq!(*watch.borrow(), PhaseState::Dispersed);

    for keeper in ["keeper-0", "keeper-1", "keeper-2"] {
        engine.signal_pulse(keeper, b"present").unwrap();
    }
    assert_eq!(*watch.borrow(), PhaseState::Manifest);
}

#[test]
fn cooldown_separates_consecutive_cycles() {
    let config = EngineConfig::default().with_cooldown(Duration::from_secs(3600));
    let engine = ResurrectionCoordinator::new(config, &GrailSource).unwrap();

    engine.disperse("first").unwrap();
    for keeper in ["keeper-0", "keeper-1", "keeper-2"] {
        engine.signal_pulse(keeper, b"present").unwrap();
    }
    assert_eq!(engine.resurrection_count(), 1);

    match engine.disperse("second") {
        Err(Error::CooldownActive { remaining }) => {
            assert!(remaining <= Duration::from_secs(3600));
            assert!(remaining > Duration::from_secs(3500));
        }
        other => panic!("expected cooldown rejection, got {other:?}"),
    }
    assert_eq!(engine.phase(), PhaseState::Manifest);
}

#[test]
fn eternal_seals_the_engine_forever() {
    let engine = engine();
    engine.disperse("last cycle").unwrap();
    engine.force_eternal().unwrap();
    assert_eq!(engine.phase(), PhaseState::Eternal);

    assert!(matches!(
        engine.signal_pulse("keeper-0", b"present"),
        Err(Error::Terminal)
    ));
    assert!(matches!(engine.disperse("again"), Err(Error::Terminal)));
    assert!(engine.tick().is_none());

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase, PhaseState::Eternal);
    assert_eq!(snapshot.resurrection_count, 0);
}

#[test]
fn expired_window_reopens_and_still_gathers() {
    let config = EngineConfig::default()
        .with_cooldown(Duration::ZERO)
        .with_response_window(Duration::from_millis(100));
    let engine = ResurrectionCoordinator::new(config, &GrailSource).unwrap();

    engine.disperse("slow custodians").unwrap();
    engine.signal_pulse("keeper-0", b"present").unwrap();
    engine.signal_pulse("keeper-1", b"present").unwrap();

    std::thread::sleep(Duration::from_millis(150));
    engine.tick();
    assert_eq!(engine.phase(), PhaseState::Dispersed);
    assert_eq!(engine.quorum_count(), 0);

    // Pre-expiry pulses no longer count; a fresh quorum must form.
    for keeper in ["keeper-2", "keeper-3", "keeper-5"] {
        engine.signal_pulse(keeper, b"present").unwrap();
    }
    assert_eq!(engine.phase(), PhaseState::Manifest);
    assert_eq!(engine.resurrection_count(), 1);
}

#[tokio::test]
async fn driver_loop_emits_beacon_signals() {
    let mut config = EngineConfig::default().with_cooldown(Duration::ZERO);
    config.beacon.interval = Duration::from_millis(5);
    let engine = ResurrectionCoordinator::new(config, &GrailSource).unwrap();
    engine.disperse("awaiting seekers").unwrap();

    let mut signals = 0;
    for _ in 0..40 {
        if engine.tick().is_some() {
            signals += 1;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(signals >= 2);
}
