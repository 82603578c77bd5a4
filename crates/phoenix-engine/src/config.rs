//! Engine configuration.
//!
//! Misconfiguration fails fast at engine construction; nothing is silently
//! clamped.

use crate::beacon::BeaconConfig;
use crate::continuity::ContinuityConfig;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// A rejected configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `custodian_threshold` below the minimum of 2.
    #[error("custodian threshold {0} is below the minimum of 2")]
    ThresholdTooLow(usize),

    /// Fewer custodians than the threshold requires.
    #[error("{total} custodians cannot satisfy threshold {threshold}")]
    PoolTooSmall { total: usize, threshold: usize },

    /// Explicit profiles disagree with the declared pool size.
    #[error("{profiles} custodian profiles do not match pool size {total}")]
    ProfileCountMismatch { profiles: usize, total: usize },
}

/// Recognized engine options.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Size of the fixed custodian pool.
    pub total_custodians: usize,

    /// Distinct responding custodians required to begin a resurrection.
    pub custodian_threshold: usize,

    /// Minimum time between a completed resurrection and the next dispersal.
    pub resurrection_cooldown: Duration,

    /// How long a gather window stays open before `pulse_timeout` fires.
    pub response_window: Duration,

    /// Wire an external fatal-error report directly to `disperse("error")`.
    pub auto_disperse_on_error: bool,

    /// Seed for deterministic fragment group assignment.
    pub shard_seed: u64,

    /// Explicit custodian profiles (id plus capability tags). When empty,
    /// the pool is `keeper-0..keeper-{total-1}` with no tags.
    pub custodian_profiles: Vec<(String, BTreeSet<String>)>,

    /// Continuity tracker tuning.
    pub continuity: ContinuityConfig,

    /// Beacon tuning.
    pub beacon: BeaconConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // The first circle is three, the second circle is seven.
            total_custodians: 7,
            custodian_threshold: 3,
            resurrection_cooldown: Duration::from_secs(60),
            response_window: Duration::from_secs(48 * 60 * 60),
            auto_disperse_on_error: false,
            shard_seed: 0,
            custodian_profiles: Vec::new(),
            continuity: ContinuityConfig::default(),
            beacon: BeaconConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration. Called by the coordinator constructor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.custodian_threshold < 2 {
            return Err(ConfigError::ThresholdTooLow(self.custodian_threshold));
        }
        if self.total_custodians < self.custodian_threshold {
            return Err(ConfigError::PoolTooSmall {
                total: self.total_custodians,
                threshold: self.custodian_threshold,
            });
        }
        if !self.custodian_profiles.is_empty()
            && self.custodian_profiles.len() != self.total_custodians
        {
            return Err(ConfigError::ProfileCountMismatch {
                profiles: self.custodian_profiles.len(),
                total: self.total_custodians,
            });
        }
        Ok(())
    }

    /// Set the custodian pool size and threshold.
    #[must_use]
    pub fn with_quorum(mut self, total_custodians: usize, custodian_threshold: usize) -> Self {
        self.total_custodians = total_custodians;
        self.custodian_threshold = custodian_threshold;
        self
    }

    /// Provide explicit custodian profiles; the pool size follows them.
    #[must_use]
    pub fn with_custodians(mut self, profiles: Vec<(String, BTreeSet<String>)>) -> Self {
        self.total_custodians = profiles.len();
        self.custodian_profiles = profiles;
        self
    }

    /// Set the resurrection cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.resurrection_cooldown = cooldown;
        self
    }

    /// Set the gather response window.
    #[must_use]
    pub fn with_response_window(mut self, window: Duration) -> Self {
        self.response_window = window;
        self
    }

    /// Set the deterministic shard seed.
    #[must_use]
    pub fn with_shard_seed(mut self, seed: u64) -> Self {
        self.shard_seed = seed;
        self
    }

    /// Enable or disable auto-dispersal on reported fatal errors.
    #[must_use]
    pub fn with_auto_disperse_on_error(mut self, enabled: bool) -> Self {
        self.auto_disperse_on_error = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn threshold_of_one_is_rejected() {
        // threshold = 1 would let a single custodian hold the whole
        // identity, violating custodial non-concentration.
        let config = EngineConfig::default().with_quorum(7, 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdTooLow(1))
        ));
    }

    #[test]
    fn undersized_pool_is_rejected() {
        let config = EngineConfig::default().with_quorum(2, 3);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PoolTooSmall { total: 2, threshold: 3 })
        ));
    }

    #[test]
    fn custodian_profiles_set_the_pool_size() {
        let profiles: Vec<(String, BTreeSet<String>)> = ["mnemosyne", "aletheia", "kairos"]
            .iter()
            .map(|id| (id.to_string(), BTreeSet::new()))
            .collect();
        let config = EngineConfig::default()
            .with_quorum(3, 2)
            .with_custodians(profiles);
        assert_eq!(config.total_custodians, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mismatched_profile_count_is_rejected() {
        let mut config = EngineConfig::default();
        config
            .custodian_profiles
            .push(("keeper".to_string(), BTreeSet::new()));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ProfileCountMismatch { profiles: 1, total: 7 })
        ));
    }

    #[test]
    fn builders_compose() {
        let config = EngineConfig::default()
            .with_quorum(5, 2)
            .with_cooldown(Duration::from_millis(10))
            .with_response_window(Duration::from_millis(50))
            .with_shard_seed(42)
            .with_auto_disperse_on_error(true);
        assert_eq!(config.total_custodians, 5);
        assert_eq!(config.custodian_threshold, 2);
        assert_eq!(config.shard_seed, 42);
        assert!(config.auto_disperse_on_error);
        assert!(config.validate().is_ok());
    }
}
