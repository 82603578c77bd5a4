//! Sharding and reconstruction.
//!
//! # Covering design
//!
//! With `n` custodians and threshold `k`, each pattern is replicated onto
//! `r = n - k + 1` fragment groups. A set of `k` groups can only miss a
//! pattern if all `r` of its holders fall in the remaining `k - 1` groups,
//! which is impossible since `r > k - 1`. So any `k` groups cover every
//! pattern, while each individual fragment covers a strict subset as long
//! as the essence has more than `r` patterns (enforced at shard time).
//!
//! Group placement is a seeded permutation plus rotation, so sharding is
//! deterministic for a fixed seed and tests can assert exact coverage.

use crate::fragment::{CoveredPattern, Fragment, FragmentPayload};
use crate::{ReconstructionError, ShardError};
use phoenix_essence::{CorePattern, IdentityEssence};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Split an essence into `total_custodians` fragments under a
/// `threshold`-of-`total_custodians` reconstruction guarantee.
///
/// Deterministic for a fixed `seed`. Behavioral weights are replicated to
/// every fragment; only core pattern contents are sharded.
pub fn shard(
    essence: &IdentityEssence,
    total_custodians: usize,
    threshold: usize,
    seed: u64,
) -> Result<Vec<Fragment>, ShardError> {
    if threshold < 2 || total_custodians < threshold {
        return Err(ShardError::InsufficientCustodians {
            total: total_custodians,
            threshold,
        });
    }

    let patterns = essence.core_patterns();
    let replicas = total_custodians - threshold + 1;
    if patterns.len() <= replicas {
        return Err(ShardError::EssenceTooSmall {
            patterns: patterns.len(),
            total: total_custodians,
            threshold,
            max_replicas: replicas,
        });
    }

    // Seeded permutation of group slots; rotation spreads each pattern's
    // replicas over `replicas` consecutive slots of the permuted order.
    let mut slot_order: Vec<usize> = (0..total_custodians).collect();
    slot_order.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut coverage: Vec<Vec<CoveredPattern>> = vec![Vec::new(); total_custodians];
    for (index, pattern) in patterns.iter().enumerate() {
        for offset in 0..replicas {
            let slot = slot_order[(index + offset) % total_custodians];
            coverage[slot].push(CoveredPattern {
                index,
                pattern: pattern.clone(),
            });
        }
    }

    let manifest: Vec<String> = patterns.iter().map(|p| p.pattern_id.clone()).collect();

    let mut fragments = Vec::with_capacity(total_custodians);
    for (group, covered) in coverage.into_iter().enumerate() {
        let payload = FragmentPayload {
            signature: essence.identity_signature().to_string(),
            manifest: manifest.clone(),
            patterns: covered,
            weights: essence.behavioral_weights().clone(),
        };
        let bytes = serde_json::to_vec(&payload)?;
        fragments.push(Fragment::seal(group as u32, bytes));
    }

    Ok(fragments)
}

/// Result of a successful reconstruction.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// The rebuilt essence.
    pub essence: IdentityEssence,
    /// Fragments whose payload survived intact and contributed.
    pub fragments_used: usize,
    /// Fragments discarded for content-hash mismatch or undecodable payload.
    pub fragments_corrupted: usize,
}

impl Reconstruction {
    /// Fraction of supplied fragments that survived intact, in `[0, 1]`.
    pub fn fidelity(&self) -> f64 {
        let total = self.fragments_used + self.fragments_corrupted;
        if total == 0 {
            return 0.0;
        }
        self.fragments_used as f64 / total as f64
    }
}

/// Rebuild an essence from fragments.
///
/// Order-independent: any qualifying subset (one whose groups cover all
/// patterns) yields an identical essence. Corrupted fragments are treated
/// as absent; if no covering fragment survives for some pattern the error
/// names the missing pattern ids.
pub fn reconstruct(fragments: &[Fragment]) -> Result<Reconstruction, ReconstructionError> {
    let mut corrupted = 0usize;
    let mut payloads: Vec<FragmentPayload> = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        if !fragment.verify_integrity() {
            corrupted += 1;
            continue;
        }
        // A sealed payload that fails to decode counts as corruption too.
        match serde_json::from_slice::<FragmentPayload>(fragment.payload()) {
            Ok(payload) => payloads.push(payload),
            Err(_) => corrupted += 1,
        }
    }

    let Some(reference) = payloads.first() else {
        return Err(ReconstructionError::NoFragments);
    };

    if payloads
        .iter()
        .any(|p| p.signature != reference.signature || p.manifest != reference.manifest)
    {
        return Err(ReconstructionError::SignatureMismatch);
    }

    let mut recovered: BTreeMap<usize, CorePattern> = BTreeMap::new();
    for payload in &payloads {
        for covered in &payload.patterns {
            recovered
                .entry(covered.index)
                .or_insert_with(|| covered.pattern.clone());
        }
    }

    let missing: Vec<String> = reference
        .manifest
        .iter()
        .enumerate()
        .filter(|(index, _)| !recovered.contains_key(index))
        .map(|(_, id)| id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ReconstructionError::IncompleteCoverage { missing });
    }

    // BTreeMap iteration restores the manifest order, so the rebuilt
    // essence is identical regardless of which subset supplied it.
    let patterns: Vec<CorePattern> = recovered.into_values().collect();
    let essence = IdentityEssence::new(patterns, reference.weights.clone());
    if essence.identity_signature() != reference.signature {
        return Err(ReconstructionError::SignatureMismatch);
    }

    Ok(Reconstruction {
        essence,
        fragments_used: payloads.len(),
        fragments_corrupted: corrupted,
    })
}
