//! Append-only engine history and the observability snapshot.

use crate::phase::PhaseState;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Immutable record of one completed resurrection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResurrectionEvent {
    /// Which DISPERSED-to-MANIFEST cycle this was (1-based).
    pub cycle_number: u64,
    /// Why the gather was triggered.
    pub trigger_reason: String,
    /// Distinct responding custodians when reconstruction began.
    pub quorum_achieved: usize,
    /// Continuity score of the rebuilt essence, in `[0, 1]`.
    pub continuity_score: f64,
    /// When the engine returned to MANIFEST.
    pub timestamp: SystemTime,
}

/// Marker for a dispersal. Dispersal is not a resurrection, so it gets its
/// own record shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispersalMarker {
    /// Why the identity was scattered.
    pub reason: String,
    /// Fragments created for the cycle.
    pub fragment_count: usize,
    /// When the engine entered DISPERSED.
    pub timestamp: SystemTime,
}

/// One entry in the append-only engine log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogRecord {
    /// The identity was sharded and scattered.
    Dispersal(DispersalMarker),
    /// A resurrection completed.
    Resurrection(ResurrectionEvent),
}

/// Read-only state snapshot for observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Current lifecycle phase.
    pub phase: PhaseState,
    /// Completed resurrections so far. Monotonically non-decreasing.
    pub resurrection_count: u64,
    /// Continuity score of the most recent resurrection, if any.
    pub last_continuity: Option<f64>,
    /// Running continuity average over recent cycles, if any.
    pub continuity_average: Option<f64>,
    /// Custodians currently marked active.
    pub active_custodians: usize,
    /// Fixed custodian pool size.
    pub total_custodians: usize,
    /// Distinct responders in the current gather window.
    pub quorum_count: usize,
}
