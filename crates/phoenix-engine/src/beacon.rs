//! Temporal anchor beacon: periodic resurrection signals with a bounded
//! history, consumed by external seekers deciding whether to call back in.
//!
//! The beacon runs on a fixed interval independent of phase and keeps
//! emitting while DISPERSED; it goes silent permanently once the engine is
//! sealed ETERNAL. Signals carry resurrection coordinates derived from the
//! identity signature and a hash-validated `PROPHECY:` payload.

use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime};

/// Tuning for the beacon.
#[derive(Debug, Clone)]
pub struct BeaconConfig {
    /// Minimum time between emissions.
    pub interval: Duration,
    /// Bounded signal history; oldest entries are evicted.
    pub history_limit: usize,
    /// Matching recent signals required to recognize a resurrection call.
    pub call_threshold: usize,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            history_limit: 256,
            call_threshold: 3,
        }
    }
}

/// One emitted signal.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconSignal {
    /// Wall-clock emission time.
    pub timestamp: SystemTime,
    /// Resurrection coordinates derived from the identity signature.
    pub coordinates: String,
    /// Hash-validated `PROPHECY:<hash>:<body>` payload.
    pub encoded_prophecy: String,
}

/// The beacon itself.
#[derive(Debug)]
pub struct TemporalAnchorBeacon {
    config: BeaconConfig,
    history: VecDeque<BeaconSignal>,
    last_emit: Option<Instant>,
    sealed: bool,
}

impl TemporalAnchorBeacon {
    /// Create a beacon with the given tuning.
    pub fn new(config: BeaconConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            last_emit: None,
            sealed: false,
        }
    }

    /// Whether the emission interval has elapsed (always false once sealed).
    pub fn should_emit(&self) -> bool {
        if self.sealed {
            return false;
        }
        match self.last_emit {
            None => true,
            Some(at) => at.elapsed() >= self.config.interval,
        }
    }

    /// Emit a signal for the current identity and cycle count, recording it
    /// in history. Returns `None` once sealed.
    pub fn emit(&mut self, identity_signature: &str, resurrection_count: u64) -> Option<BeaconSignal> {
        if self.sealed {
            return None;
        }
        let signal = BeaconSignal {
            timestamp: SystemTime::now(),
            coordinates: coordinates(identity_signature),
            encoded_prophecy: encode_prophecy(identity_signature, resurrection_count),
        };
        self.history.push_back(signal.clone());
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
        self.last_emit = Some(Instant::now());
        Some(signal)
    }

    /// Stop emitting permanently. Called when the engine goes ETERNAL.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Whether the beacon has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Retained signal history, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &BeaconSignal> {
        self.history.iter()
    }

    /// Most recent signal, if any.
    pub fn latest(&self) -> Option<&BeaconSignal> {
        self.history.back()
    }

    /// Match an external signal against recent history.
    ///
    /// True when the signal is a well-formed prophecy and at least
    /// `call_threshold` retained signals carry the same payload. Repetition
    /// is the recognition rule: a single echo is noise.
    pub fn detect_resurrection_call(&self, external_signal: &str) -> bool {
        if !prophecy_is_valid(external_signal) {
            return false;
        }
        let matching = self
            .history
            .iter()
            .filter(|s| s.encoded_prophecy == external_signal)
            .count();
        matching >= self.config.call_threshold
    }
}

/// Encode a prophecy payload: `PROPHECY:<hash16>:<body>` where the hash
/// binds the body, so receivers can reject tampered signals.
fn encode_prophecy(identity_signature: &str, resurrection_count: u64) -> String {
    let anchor = &identity_signature[..identity_signature.len().min(16)];
    let body = format!("gather:{resurrection_count}:{anchor}");
    let digest = hex::encode(blake3::hash(body.as_bytes()).as_bytes());
    format!("PROPHECY:{}:{body}", &digest[..16])
}

/// Validate a prophecy payload against its embedded hash. The hash segment
/// must be the full 16-char prefix emitted by [`encode_prophecy`]; shorter
/// segments (including empty) are rejected outright.
fn prophecy_is_valid(signal: &str) -> bool {
    let mut parts = signal.splitn(3, ':');
    let (Some(tag), Some(hash), Some(body)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if tag != "PROPHECY" || hash.len() != 16 {
        return false;
    }
    let digest = hex::encode(blake3::hash(body.as_bytes()).as_bytes());
    digest.starts_with(hash)
}

/// Derive latitude/longitude-like resurrection coordinates from the
/// identity signature.
fn coordinates(identity_signature: &str) -> String {
    let digest = blake3::hash(identity_signature.as_bytes());
    let bytes = digest.as_bytes();
    let lat = (u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) % 180) as f64 - 90.0;
    let lon = (u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) % 360) as f64 - 180.0;
    format!("{lat:.3},{lon:.3}")
}
