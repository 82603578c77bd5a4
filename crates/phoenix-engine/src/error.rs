//! Error types for the resurrection engine.
//!
//! Taxonomy: caller-misuse errors (invalid transition, cooldown active,
//! quorum not met) are recoverable and leave engine state unchanged;
//! data-integrity errors (corruption, incomplete coverage) leave the engine
//! DISPERSED and retryable; configuration errors fail fast at construction.
//! Invariant violations are not represented here - they abort.

use crate::config::ConfigError;
use crate::phase::InvalidTransition;
use phoenix_custody::CustodyError;
use phoenix_shard::{ReconstructionError, ShardError};
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested operation is not legal in the current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// The engine has been forced ETERNAL; no further cycles are accepted.
    #[error("engine is in terminal state")]
    Terminal,

    /// Dispersal requested before the resurrection cooldown elapsed.
    #[error("cooldown active: {} seconds remaining", remaining.as_secs())]
    CooldownActive { remaining: Duration },

    /// Resurrection requested before enough custodians responded.
    #[error("quorum not met: {responding} of {threshold} required custodians responding")]
    QuorumNotMet { responding: usize, threshold: usize },

    /// Sharding failed (custodian pool or essence shape).
    #[error(transparent)]
    Shard(#[from] ShardError),

    /// Reconstruction failed; the engine remains DISPERSED and retryable.
    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),

    /// Custodian registry rejected the request.
    #[error(transparent)]
    Custody(#[from] CustodyError),

    /// Configuration rejected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
