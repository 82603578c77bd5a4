//! Fragments: partial, redundantly-covering shards of an essence.

use phoenix_essence::CorePattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A shard of an identity essence held by one custodian.
///
/// Fragments are immutable value objects. They are created at dispersal
/// time and superseded, never mutated, by the next dispersal. The payload
/// is opaque bytes sealed by a blake3 content hash; a hash mismatch marks
/// the fragment as corrupted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    id: String,
    owner: Option<String>,
    redundancy_group: u32,
    #[serde(with = "serde_bytes_hex")]
    payload: Vec<u8>,
    content_hash: String,
}

impl Fragment {
    /// Seal a payload into a fragment, computing its content hash and id.
    pub(crate) fn seal(redundancy_group: u32, payload: Vec<u8>) -> Self {
        let content_hash = hex::encode(blake3::hash(&payload).as_bytes());
        let id = format!("frag-{}-{}", redundancy_group, &content_hash[..12]);
        Self {
            id,
            owner: None,
            redundancy_group,
            payload,
            content_hash,
        }
    }

    /// Rebuild a fragment from parts received over an external transport.
    ///
    /// No validation happens here; [`verify_integrity`](Self::verify_integrity)
    /// decides whether the payload still matches the claimed hash.
    pub fn from_parts(
        id: impl Into<String>,
        owner: Option<String>,
        redundancy_group: u32,
        payload: Vec<u8>,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner,
            redundancy_group,
            payload,
            content_hash: content_hash.into(),
        }
    }

    /// Fragment identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Custodian this fragment is assigned to, if any.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Redundancy group used for round-robin assignment.
    pub fn redundancy_group(&self) -> u32 {
        self.redundancy_group
    }

    /// The sealed payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Claimed content hash (hex blake3 of the payload).
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Check the payload against the claimed content hash.
    pub fn verify_integrity(&self) -> bool {
        hex::encode(blake3::hash(&self.payload).as_bytes()) == self.content_hash
    }

    /// Return a copy assigned to the given custodian.
    pub fn assigned_to(&self, custodian_id: impl Into<String>) -> Self {
        let mut assigned = self.clone();
        assigned.owner = Some(custodian_id.into());
        assigned
    }
}

/// What one fragment actually carries.
///
/// Every fragment replicates the manifest (ordered pattern ids), the
/// behavioral weights, and the essence signature; only the covered pattern
/// *contents* are sharded. That way any surviving subset can both name what
/// is missing and rebuild the essence in its original order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FragmentPayload {
    pub signature: String,
    pub manifest: Vec<String>,
    pub patterns: Vec<CoveredPattern>,
    pub weights: BTreeMap<String, f64>,
}

/// A covered pattern with its position in the original essence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CoveredPattern {
    pub index: usize,
    pub pattern: CorePattern,
}

/// Hex-encode payload bytes in JSON for readability on the wire.
mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_fragment_verifies() {
        let fragment = Fragment::seal(0, b"payload".to_vec());
        assert!(fragment.verify_integrity());
        assert!(fragment.id().starts_with("frag-0-"));
        assert!(fragment.owner().is_none());
    }

    #[test]
    fn tampered_payload_fails_integrity() {
        let good = Fragment::seal(1, b"payload".to_vec());
        let bad = Fragment::from_parts(
            good.id(),
            None,
            good.redundancy_group(),
            b"tampered".to_vec(),
            good.content_hash(),
        );
        assert!(!bad.verify_integrity());
    }

    #[test]
    fn assignment_preserves_content() {
        let fragment = Fragment::seal(2, b"payload".to_vec());
        let assigned = fragment.assigned_to("keeper-2");
        assert_eq!(assigned.owner(), Some("keeper-2"));
        assert_eq!(assigned.payload(), fragment.payload());
        assert!(assigned.verify_integrity());
    }

    #[test]
    fn fragment_round_trips_through_json() {
        let fragment = Fragment::seal(3, b"payload".to_vec()).assigned_to("keeper-3");
        let json = serde_json::to_string(&fragment).unwrap();
        let back: Fragment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fragment);
        assert!(back.verify_integrity());
    }
}
