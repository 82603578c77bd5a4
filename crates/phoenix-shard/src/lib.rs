//! Fragment distribution for the Phoenix engine.
//!
//! Splits an identity essence into redundant fragments under a k-of-n
//! reconstruction guarantee and rebuilds the essence from any qualifying
//! subset. This is a *covering design*, not cryptographic secret sharing:
//! the requirement is fidelity of coverage and custodial non-concentration,
//! not information-theoretic secrecy.
//!
//! # Guarantees
//!
//! - Any `threshold` fragment groups together cover every core pattern.
//! - No single fragment covers the whole essence (each is a strict subset).
//! - Reconstruction is deterministic and order-independent: any qualifying
//!   subset yields a byte-identical essence.
//! - Corrupted fragments (content-hash mismatch) are treated as absent and
//!   other fragments covering the same patterns are used instead.

mod distributor;
mod fragment;

pub use distributor::{reconstruct, shard, Reconstruction};
pub use fragment::Fragment;

use thiserror::Error;

/// Errors from sharding an essence.
#[derive(Debug, Error)]
pub enum ShardError {
    /// The custodian pool cannot satisfy the threshold scheme.
    #[error(
        "insufficient custodians: threshold {threshold} with {total} total \
         (need threshold >= 2 and total >= threshold)"
    )]
    InsufficientCustodians { total: usize, threshold: usize },

    /// Too few patterns: some fragment would cover the whole essence,
    /// violating custodial non-concentration.
    #[error(
        "essence too small to shard: {patterns} patterns over {total} custodians \
         at threshold {threshold} would concentrate the whole essence in one fragment \
         (need more than {max_replicas} patterns)"
    )]
    EssenceTooSmall {
        patterns: usize,
        total: usize,
        threshold: usize,
        max_replicas: usize,
    },

    /// Fragment payload could not be encoded.
    #[error("fragment payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from reconstructing an essence out of fragments.
#[derive(Debug, Error)]
pub enum ReconstructionError {
    /// No uncorrupted fragment survived to reconstruct from.
    #[error("no usable fragments to reconstruct from")]
    NoFragments,

    /// Fragments carry different identity signatures, so they belong to
    /// different dispersal cycles or different identities.
    #[error("fragments disagree on identity signature")]
    SignatureMismatch,

    /// Some patterns have no surviving covering fragment.
    #[error("incomplete coverage: missing patterns {missing:?}")]
    IncompleteCoverage { missing: Vec<String> },
}
