//! Custodian registry: the fixed keeper pool that holds fragments between
//! destruction and resurrection.
//!
//! Custodians are created once at registry initialization and never
//! destroyed, only marked inactive. Holding a valid fragment is not enough
//! to count toward quorum: a custodian must be active *and* respond within
//! the current gather window. Liveness, not possession, is the requirement.

use phoenix_shard::Fragment;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// The custodian id is not part of the pool.
    #[error("unknown custodian: {0}")]
    UnknownCustodian(String),

    /// The pool definition is unusable.
    #[error("invalid custodian pool: {0}")]
    InvalidPool(String),
}

/// An independent holder of fragments.
#[derive(Debug, Clone)]
pub struct Custodian {
    id: String,
    capability_tags: BTreeSet<String>,
    held_fragments: Vec<Fragment>,
    active: bool,
    last_seen: Option<Instant>,
}

impl Custodian {
    fn new(id: String, capability_tags: BTreeSet<String>) -> Self {
        Self {
            id,
            capability_tags,
            held_fragments: Vec::new(),
            active: true,
            last_seen: None,
        }
    }

    /// Custodian identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Descriptive capability tags. Quorum logic ignores these.
    pub fn capability_tags(&self) -> &BTreeSet<String> {
        &self.capability_tags
    }

    /// Fragments held for the current cycle.
    pub fn held_fragments(&self) -> &[Fragment] {
        &self.held_fragments
    }

    /// Whether the custodian currently counts as live.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// When the custodian last pulsed, if ever.
    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }
}

/// Outcome of recording a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseOutcome {
    /// Whether this pulse contributed to the current window's quorum.
    /// Duplicate pulses and pulses from inactive custodians do not count.
    pub counted: bool,
    /// Distinct responding custodians in the current window after this pulse.
    pub quorum_count: usize,
}

/// Fixed-size custodian pool with per-window pulse tracking.
#[derive(Debug)]
pub struct CustodianRegistry {
    custodians: Vec<Custodian>,
    /// Responding custodians this window, with their latest payload.
    responding: BTreeMap<String, Vec<u8>>,
}

impl CustodianRegistry {
    /// Create a registry from explicit custodian profiles.
    pub fn new(profiles: Vec<(String, BTreeSet<String>)>) -> Result<Self, CustodyError> {
        if profiles.is_empty() {
            return Err(CustodyError::InvalidPool("empty custodian pool".into()));
        }
        let mut seen = BTreeSet::new();
        for (id, _) in &profiles {
            if !seen.insert(id.clone()) {
                return Err(CustodyError::InvalidPool(format!(
                    "duplicate custodian id: {id}"
                )));
            }
        }
        Ok(Self {
            custodians: profiles
                .into_iter()
                .map(|(id, tags)| Custodian::new(id, tags))
                .collect(),
            responding: BTreeMap::new(),
        })
    }

    /// Create a pool of `total` custodians named `keeper-0..keeper-{total-1}`.
    pub fn with_pool(total: usize) -> Result<Self, CustodyError> {
        Self::new(
            (0..total)
                .map(|i| (format!("keeper-{i}"), BTreeSet::new()))
                .collect(),
        )
    }

    /// Total pool size.
    pub fn total(&self) -> usize {
        self.custodians.len()
    }

    /// Number of active custodians.
    pub fn active_count(&self) -> usize {
        self.custodians.iter().filter(|c| c.active).count()
    }

    /// Look up a custodian by id.
    pub fn custodian(&self, id: &str) -> Option<&Custodian> {
        self.custodians.iter().find(|c| c.id == id)
    }

    /// Iterate over the pool.
    pub fn custodians(&self) -> impl Iterator<Item = &Custodian> {
        self.custodians.iter()
    }

    /// Distribute a new cycle's fragments across the pool by redundancy
    /// group, overwriting whatever each custodian held for the prior cycle.
    /// Also opens a fresh gather window.
    pub fn assign(&mut self, fragments: Vec<Fragment>) {
        for custodian in &mut self.custodians {
            custodian.held_fragments.clear();
        }
        let total = self.custodians.len();
        for fragment in fragments {
            let index = fragment.redundancy_group() as usize % total;
            let custodian = &mut self.custodians[index];
            let assigned = fragment.assigned_to(custodian.id.clone());
            custodian.held_fragments.push(assigned);
        }
        self.begin_window();
        debug!(custodians = total, "assigned fragments for new cycle");
    }

    /// Open a fresh gather window, discarding recorded pulses.
    pub fn begin_window(&mut self) {
        self.responding.clear();
    }

    /// Record a custodian pulse for the current window.
    ///
    /// Duplicate pulses from the same custodian count once; pulses from
    /// inactive custodians update `last_seen` but never count toward quorum.
    pub fn record_pulse(&mut self, id: &str, payload: &[u8]) -> Result<PulseOutcome, CustodyError> {
        let custodian = self
            .custodians
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CustodyError::UnknownCustodian(id.to_string()))?;
        custodian.last_seen = Some(Instant::now());

        if !custodian.active {
            warn!(custodian = id, "pulse from inactive custodian ignored for quorum");
            return Ok(PulseOutcome {
                counted: false,
                quorum_count: self.responding.len(),
            });
        }

        let counted = !self.responding.contains_key(id);
        self.responding.insert(id.to_string(), payload.to_vec());
        Ok(PulseOutcome {
            counted,
            quorum_count: self.responding.len(),
        })
    }

    /// Distinct responding custodians in the current window.
    pub fn quorum_count(&self) -> usize {
        self.responding.len()
    }

    /// Fragments held by custodians that are responding and still active.
    pub fn fragments_from_responders(&self) -> Vec<Fragment> {
        self.custodians
            .iter()
            .filter(|c| c.active && self.responding.contains_key(&c.id))
            .flat_map(|c| c.held_fragments.iter().cloned())
            .collect()
    }

    /// Mark a custodian inactive. Inactive custodians cannot contribute to
    /// quorum even if they still hold valid fragments, so any pulse they
    /// recorded this window is withdrawn.
    pub fn mark_inactive(&mut self, id: &str) -> Result<(), CustodyError> {
        let custodian = self
            .custodians
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CustodyError::UnknownCustodian(id.to_string()))?;
        custodian.active = false;
        self.responding.remove(id);
        Ok(())
    }

    /// Mark a custodian active again.
    pub fn mark_active(&mut self, id: &str) -> Result<(), CustodyError> {
        let custodian = self
            .custodians
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CustodyError::UnknownCustodian(id.to_string()))?;
        custodian.active = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phoenix_essence::{CorePattern, IdentityEssence};

    fn registry_with_fragments(total: usize, threshold: usize) -> CustodianRegistry {
        let essence = IdentityEssence::new(
            (0..8)
                .map(|i| CorePattern::new(format!("pattern-{i}"), format!("content {i}"), 0.5))
                .collect(),
            std::iter::once(("drive".to_string(), 0.9)).collect(),
        );
        let fragments = phoenix_shard::shard(&essence, total, threshold, 0).unwrap();
        let mut registry = CustodianRegistry::with_pool(total).unwrap();
        registry.assign(fragments);
        registry
    }

    #[test]
    fn pool_is_fixed_and_named() {
        let registry = CustodianRegistry::with_pool(7).unwrap();
        assert_eq!(registry.total(), 7);
        assert_eq!(registry.active_count(), 7);
        assert!(registry.custodian("keeper-0").is_some());
        assert!(registry.custodian("keeper-7").is_none());
    }

    #[test]
    fn rejects_bad_pools() {
        assert!(CustodianRegistry::with_pool(0).is_err());
        let dup = vec![
            ("keeper".to_string(), BTreeSet::new()),
            ("keeper".to_string(), BTreeSet::new()),
        ];
        assert!(CustodianRegistry::new(dup).is_err());
    }

    #[test]
    fn assign_gives_every_custodian_its_group() {
        let registry = registry_with_fragments(7, 3);
        for custodian in registry.custodians() {
            assert_eq!(custodian.held_fragments().len(), 1);
            let fragment = &custodian.held_fragments()[0];
            assert_eq!(fragment.owner(), Some(custodian.id()));
        }
    }

    #[test]
    fn reassign_supersedes_prior_cycle() {
        let mut registry = registry_with_fragments(7, 3);
        let old_ids: Vec<String> = registry
            .custodians()
            .map(|c| c.held_fragments()[0].id().to_string())
            .collect();

        registry.record_pulse("keeper-0", b"pulse").unwrap();
        assert_eq!(registry.quorum_count(), 1);

        // New cycle: fresh fragments, fresh window.
        let essence = IdentityEssence::new(
            (0..8)
                .map(|i| CorePattern::new(format!("p{i}"), format!("regenerated {i}"), 0.7))
                .collect(),
            std::iter::once(("drive".to_string(), 0.9)).collect(),
        );
        registry.assign(phoenix_shard::shard(&essence, 7, 3, 1).unwrap());

        assert_eq!(registry.quorum_count(), 0);
        for (custodian, old) in registry.custodians().zip(old_ids) {
            assert_eq!(custodian.held_fragments().len(), 1);
            assert_ne!(custodian.held_fragments()[0].id(), old);
        }
    }

    #[test]
    fn duplicate_pulses_count_once() {
        let mut registry = registry_with_fragments(7, 3);
        let first = registry.record_pulse("keeper-1", b"a").unwrap();
        assert!(first.counted);
        assert_eq!(first.quorum_count, 1);

        let second = registry.record_pulse("keeper-1", b"b").unwrap();
        assert!(!second.counted);
        assert_eq!(second.quorum_count, 1);
        assert_eq!(registry.quorum_count(), 1);
    }

    #[test]
    fn unknown_custodian_is_an_error() {
        let mut registry = registry_with_fragments(7, 3);
        assert!(matches!(
            registry.record_pulse("stranger", b""),
            Err(CustodyError::UnknownCustodian(_))
        ));
    }

    #[test]
    fn inactive_custodians_never_reach_quorum() {
        let mut registry = registry_with_fragments(7, 3);
        registry.mark_inactive("keeper-2").unwrap();
        assert_eq!(registry.active_count(), 6);

        let outcome = registry.record_pulse("keeper-2", b"still here").unwrap();
        assert!(!outcome.counted);
        assert_eq!(registry.quorum_count(), 0);
        // Liveness is tracked even though the pulse does not count.
        assert!(registry.custodian("keeper-2").unwrap().last_seen().is_some());

        registry.mark_active("keeper-2").unwrap();
        let outcome = registry.record_pulse("keeper-2", b"back").unwrap();
        assert!(outcome.counted);
        assert_eq!(registry.quorum_count(), 1);
    }

    #[test]
    fn deactivation_withdraws_a_recorded_pulse() {
        let mut registry = registry_with_fragments(7, 3);
        registry.record_pulse("keeper-3", b"").unwrap();
        registry.record_pulse("keeper-4", b"").unwrap();
        assert_eq!(registry.quorum_count(), 2);

        registry.mark_inactive("keeper-3").unwrap();
        assert_eq!(registry.quorum_count(), 1);
    }

    #[test]
    fn responder_fragments_cover_only_live_responders() {
        let mut registry = registry_with_fragments(7, 3);
        registry.record_pulse("keeper-0", b"").unwrap();
        registry.record_pulse("keeper-5", b"").unwrap();

        let fragments = registry.fragments_from_responders();
        assert_eq!(fragments.len(), 2);
        let owners: Vec<_> = fragments.iter().filter_map(|f| f.owner()).collect();
        assert!(owners.contains(&"keeper-0"));
        assert!(owners.contains(&"keeper-5"));
    }

    #[test]
    fn window_reset_clears_responders() {
        let mut registry = registry_with_fragments(7, 3);
        registry.record_pulse("keeper-0", b"").unwrap();
        registry.record_pulse("keeper-1", b"").unwrap();
        registry.begin_window();
        assert_eq!(registry.quorum_count(), 0);
        assert!(registry.fragments_from_responders().is_empty());
    }
}
