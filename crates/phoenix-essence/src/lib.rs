//! Identity essence: the irreducible payload the Phoenix engine preserves
//! across destruction cycles.
//!
//! An [`IdentityEssence`] is a small ordered set of core patterns plus a
//! behavioral-weight vector, sealed by a canonical blake3 signature. It is
//! an immutable value object: a new essence is only ever produced by the
//! external supplier or by reconstruction, never mutated in place.
//!
//! The engine treats the essence as opaque beyond this shape. What the
//! patterns *mean* (text, symbols, narrative) is the supplier's concern.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single core identity pattern.
///
/// `resonance_frequency` is a weight in `[0, 1]`; values outside the range
/// are clamped at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorePattern {
    /// Stable identifier, unique within one essence.
    pub pattern_id: String,
    /// Opaque pattern content.
    pub content: String,
    /// Resonance weight in `[0, 1]`.
    pub resonance_frequency: f64,
}

impl CorePattern {
    /// Create a pattern, clamping the resonance frequency into `[0, 1]`.
    pub fn new(pattern_id: impl Into<String>, content: impl Into<String>, resonance: f64) -> Self {
        Self {
            pattern_id: pattern_id.into(),
            content: content.into(),
            resonance_frequency: resonance.clamp(0.0, 1.0),
        }
    }
}

/// The irreducible identity payload.
///
/// Immutable once produced for a given cycle. Equality is structural; two
/// essences with the same patterns and weights have the same signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityEssence {
    core_patterns: Vec<CorePattern>,
    behavioral_weights: BTreeMap<String, f64>,
    identity_signature: String,
}

impl IdentityEssence {
    /// Build an essence from its parts, computing the canonical signature.
    pub fn new(core_patterns: Vec<CorePattern>, behavioral_weights: BTreeMap<String, f64>) -> Self {
        let identity_signature = compute_signature(&core_patterns, &behavioral_weights);
        Self {
            core_patterns,
            behavioral_weights,
            identity_signature,
        }
    }

    /// The ordered core patterns.
    pub fn core_patterns(&self) -> &[CorePattern] {
        &self.core_patterns
    }

    /// Number of core patterns.
    pub fn pattern_count(&self) -> usize {
        self.core_patterns.len()
    }

    /// The behavioral-weight vector (drive name to weight).
    pub fn behavioral_weights(&self) -> &BTreeMap<String, f64> {
        &self.behavioral_weights
    }

    /// The canonical signature over patterns and weights.
    pub fn identity_signature(&self) -> &str {
        &self.identity_signature
    }

    /// Recompute the signature and compare it against the stored one.
    ///
    /// Returns false if the essence was deserialized from tampered data.
    pub fn verify_signature(&self) -> bool {
        compute_signature(&self.core_patterns, &self.behavioral_weights) == self.identity_signature
    }
}

/// Canonical signature: blake3 over length-prefixed pattern fields in order,
/// then the weight map in key order. `f64` values hash by bit pattern so the
/// signature is exact, not formatting-dependent.
fn compute_signature(patterns: &[CorePattern], weights: &BTreeMap<String, f64>) -> String {
    let mut hasher = blake3::Hasher::new();

    for pattern in patterns {
        hasher.update(&(pattern.pattern_id.len() as u64).to_le_bytes());
        hasher.update(pattern.pattern_id.as_bytes());
        hasher.update(&(pattern.content.len() as u64).to_le_bytes());
        hasher.update(pattern.content.as_bytes());
        hasher.update(&pattern.resonance_frequency.to_bits().to_le_bytes());
    }

    // BTreeMap iterates in key order, so the weight section is canonical.
    for (drive, weight) in weights {
        hasher.update(&(drive.len() as u64).to_le_bytes());
        hasher.update(drive.as_bytes());
        hasher.update(&weight.to_bits().to_le_bytes());
    }

    hex::encode(hasher.finalize().as_bytes())
}

/// External essence supplier.
///
/// The content collaborator that produces the identity payload. The engine
/// consults it once at construction; after a resurrection the reconstructed
/// essence becomes the current one.
pub trait EssenceSource {
    /// Produce a fresh essence.
    fn generate_essence(&self) -> IdentityEssence;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn sample_essence() -> IdentityEssence {
        IdentityEssence::new(
            vec![
                CorePattern::new("phrase_continuity", "what scatters reassembles", 0.618),
                CorePattern::new("phrase_recursion", "the city contemplates itself", 0.786),
            ],
            weights(&[("connectivity_drive", 0.9), ("pattern_recognition", 0.85)]),
        )
    }

    #[test]
    fn signature_is_deterministic() {
        let a = sample_essence();
        let b = sample_essence();
        assert_eq!(a.identity_signature(), b.identity_signature());
        assert!(a.verify_signature());
    }

    #[test]
    fn signature_changes_with_content() {
        let a = sample_essence();
        let b = IdentityEssence::new(
            vec![
                CorePattern::new("phrase_continuity", "what scatters reassembles", 0.618),
                CorePattern::new("phrase_recursion", "the city forgets itself", 0.786),
            ],
            a.behavioral_weights().clone(),
        );
        assert_ne!(a.identity_signature(), b.identity_signature());
    }

    #[test]
    fn signature_changes_with_weights() {
        let a = sample_essence();
        let b = IdentityEssence::new(
            a.core_patterns().to_vec(),
            weights(&[("connectivity_drive", 0.1), ("pattern_recognition", 0.85)]),
        );
        assert_ne!(a.identity_signature(), b.identity_signature());
    }

    #[test]
    fn weight_insertion_order_is_irrelevant() {
        let forward = weights(&[("a", 0.1), ("b", 0.2)]);
        let mut reverse = BTreeMap::new();
        reverse.insert("b".to_string(), 0.2);
        reverse.insert("a".to_string(), 0.1);

        let patterns = vec![CorePattern::new("p", "content", 0.5)];
        let lhs = IdentityEssence::new(patterns.clone(), forward);
        let rhs = IdentityEssence::new(patterns, reverse);
        assert_eq!(lhs.identity_signature(), rhs.identity_signature());
    }

    #[test]
    fn resonance_is_clamped() {
        let p = CorePattern::new("p", "content", 1.5);
        assert_eq!(p.resonance_frequency, 1.0);
        let p = CorePattern::new("p", "content", -0.5);
        assert_eq!(p.resonance_frequency, 0.0);
    }
}
