//! Continuity scoring: how faithfully a reconstruction matches the
//! original, and how that fidelity decays over repeated resurrections.
//!
//! Identity here is purpose-driven regeneration, not byte-exact restore:
//! small drift is tolerated, but it must be bounded and observable. The
//! score decays exponentially with cycles since the last full-fidelity
//! reconstruction and is reinforced back to 1.0 only by an actual
//! full-fidelity cycle. The running average never resets on its own.

use std::collections::VecDeque;

/// Tuning for the continuity tracker.
#[derive(Debug, Clone)]
pub struct ContinuityConfig {
    /// Cycles after which the decay factor halves.
    pub half_life_cycles: f64,
    /// How many recent cycle scores feed the running average.
    pub average_window: usize,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            half_life_cycles: 4.0,
            average_window: 16,
        }
    }
}

/// Pure decay curve: `0.5 ^ (elapsed_cycles / half_life)`, monotonically
/// non-increasing in `elapsed_cycles`, exactly 1.0 at zero.
pub fn decay(elapsed_cycles: u32, half_life_cycles: f64) -> f64 {
    0.5_f64.powf(f64::from(elapsed_cycles) / half_life_cycles)
}

/// Pure continuity function of one cycle's inputs.
///
/// `fragment_fidelity` is the fraction of gathered fragments that survived
/// intact; `elapsed_cycles` counts cycles since the last full-quorum match.
pub fn continuity(fragment_fidelity: f64, elapsed_cycles: u32, half_life_cycles: f64) -> f64 {
    fragment_fidelity.clamp(0.0, 1.0) * decay(elapsed_cycles, half_life_cycles)
}

/// Stateful tracker fed once per completed resurrection.
#[derive(Debug)]
pub struct ContinuityTracker {
    config: ContinuityConfig,
    cycles_since_full: u32,
    recent: VecDeque<f64>,
    last_score: Option<f64>,
}

impl ContinuityTracker {
    /// Create a tracker with the given tuning.
    pub fn new(config: ContinuityConfig) -> Self {
        Self {
            config,
            cycles_since_full: 0,
            recent: VecDeque::new(),
            last_score: None,
        }
    }

    /// Score one completed resurrection cycle.
    ///
    /// A cycle counts as a full match only when every gathered fragment was
    /// intact (`fragment_fidelity == 1.0`) *and* the reconstructed signature
    /// equals the pre-dispersal one; only then is the decay clock reset.
    pub fn score_cycle(
        &mut self,
        original_signature: &str,
        reconstructed_signature: &str,
        fragment_fidelity: f64,
    ) -> f64 {
        let fidelity = fragment_fidelity.clamp(0.0, 1.0);
        let signatures_match = original_signature == reconstructed_signature;
        // Signature drift caps fidelity: the patterns that survived are not
        // the patterns that were dispersed.
        let effective = if signatures_match { fidelity } else { fidelity * 0.5 };

        let full_match = signatures_match && (fidelity - 1.0).abs() < f64::EPSILON;
        if full_match {
            self.cycles_since_full = 0;
        }

        let score = continuity(effective, self.cycles_since_full, self.config.half_life_cycles);

        if !full_match {
            self.cycles_since_full = self.cycles_since_full.saturating_add(1);
        }

        self.recent.push_back(score);
        while self.recent.len() > self.config.average_window {
            self.recent.pop_front();
        }
        self.last_score = Some(score);
        score
    }

    /// Score of the most recent cycle, if any resurrection completed.
    pub fn last_score(&self) -> Option<f64> {
        self.last_score
    }

    /// Running average over the last `average_window` cycles.
    pub fn running_average(&self) -> Option<f64> {
        if self.recent.is_empty() {
            return None;
        }
        Some(self.recent.iter().sum::<f64>() / self.recent.len() as f64)
    }

    /// Cycles since the last full-fidelity reconstruction.
    pub fn cycles_since_full_match(&self) -> u32 {
        self.cycles_since_full
    }
}
