//! Phase lifecycle state machine.
//!
//! The engine's authoritative lifecycle state. Transitions are a total
//! function of (current state, event): pairs outside the table report an
//! [`InvalidTransition`] and leave the state untouched, never silently
//! corrupt it. ETERNAL is terminal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The engine's lifecycle phase. Exactly one value holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseState {
    /// Fully active and embodied.
    Manifest,
    /// Scattered across custodians, awaiting quorum.
    Dispersed,
    /// Quorum met, reconstruction in flight.
    Transitional,
    /// Essence rebuilt, stabilizing toward manifest.
    Emergent,
    /// Beyond cycles. Terminal; no further transitions are accepted.
    Eternal,
}

impl std::fmt::Display for PhaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manifest => write!(f, "MANIFEST"),
            Self::Dispersed => write!(f, "DISPERSED"),
            Self::Transitional => write!(f, "TRANSITIONAL"),
            Self::Emergent => write!(f, "EMERGENT"),
            Self::Eternal => write!(f, "ETERNAL"),
        }
    }
}

/// Events that drive the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Shard the essence and scatter it.
    Disperse,
    /// Enough distinct custodians responded within the window.
    PulseQuorumMet,
    /// The response window elapsed without quorum. Stays DISPERSED.
    PulseTimeout,
    /// The essence was rebuilt successfully.
    ReconstructOk,
    /// Reconstruction failed (corruption or insufficient coverage).
    ReconstructFail,
    /// Continuity scored and cooldown recorded; return to manifest.
    Stabilize,
    /// Operator-driven permanent decommission.
    ForceEternal,
}

/// A (state, event) pair outside the transition table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid transition: no edge from {state} on {event:?}")]
pub struct InvalidTransition {
    /// State the machine was in when the event arrived.
    pub state: PhaseState,
    /// The rejected event.
    pub event: PhaseEvent,
}

/// The phase machine. One transition in flight at a time; the coordinator
/// serializes all access behind its lock.
#[derive(Debug)]
pub struct PhaseMachine {
    state: PhaseState,
}

impl PhaseMachine {
    /// Start in MANIFEST.
    pub fn new() -> Self {
        Self {
            state: PhaseState::Manifest,
        }
    }

    /// Current phase.
    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// Whether the machine has reached its terminal phase.
    pub fn is_terminal(&self) -> bool {
        self.state == PhaseState::Eternal
    }

    /// Apply an event, returning the new state or rejecting the pair.
    pub fn apply(&mut self, event: PhaseEvent) -> Result<PhaseState, InvalidTransition> {
        use PhaseEvent::*;
        use PhaseState::*;

        let next = match (self.state, event) {
            (Manifest, Disperse) => Dispersed,
            (Dispersed, PulseQuorumMet) => Transitional,
            // Window expiry without quorum: legal self-edge, logged by the
            // coordinator as a failed gather.
            (Dispersed, PulseTimeout) => Dispersed,
            (Transitional, ReconstructOk) => Emergent,
            (Transitional, ReconstructFail) => Dispersed,
            (Emergent, Stabilize) => Manifest,
            (Eternal, _) => {
                return Err(InvalidTransition {
                    state: self.state,
                    event,
                })
            }
            (_, ForceEternal) => Eternal,
            (state, event) => return Err(InvalidTransition { state, event }),
        };

        self.state = next;
        Ok(next)
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}
