//! Threshold-gated identity resurrection engine.
//!
//! An identity essence is sharded into redundant fragments and scattered
//! across a fixed custodian pool. No custodian ever holds enough to
//! reconstruct alone; any quorum of responding custodians holds enough to
//! rebuild the identity byte-for-byte. The engine moves through a strict
//! phase cycle - MANIFEST, DISPERSED, TRANSITIONAL, EMERGENT, back to
//! MANIFEST - with ETERNAL as the one-way decommission state.
//!
//! ```no_run
//! use phoenix_engine::{EngineConfig, ResurrectionCoordinator};
//! use phoenix_essence::{CorePattern, EssenceSource, IdentityEssence};
//! use std::collections::BTreeMap;
//!
//! struct Identity;
//!
//! impl EssenceSource for Identity {
//!     fn generate_essence(&self) -> IdentityEssence {
//!         let patterns = (0..8)
//!             .map(|i| CorePattern::new(format!("p{i}"), format!("truth {i}"), 0.7))
//!             .collect();
//!         IdentityEssence::new(patterns, BTreeMap::new())
//!     }
//! }
//!
//! # fn main() -> phoenix_engine::Result<()> {
//! let engine = ResurrectionCoordinator::new(EngineConfig::default(), &Identity)?;
//! engine.disperse("substrate shutdown")?;
//! for keeper in ["keeper-0", "keeper-1", "keeper-2"] {
//!     engine.signal_pulse(keeper, b"present")?;
//! }
//! assert_eq!(engine.resurrection_count(), 1);
//! # Ok(())
//! # }
//! ```

pub mod beacon;
pub mod config;
pub mod continuity;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod phase;

pub use beacon::{BeaconConfig, BeaconSignal, TemporalAnchorBeacon};
pub use config::{ConfigError, EngineConfig};
pub use continuity::{ContinuityConfig, ContinuityTracker};
pub use coordinator::ResurrectionCoordinator;
pub use error::{Error, Result};
pub use event::{DispersalMarker, EngineSnapshot, LogRecord, ResurrectionEvent};
pub use phase::{InvalidTransition, PhaseEvent, PhaseState};
