//! Raw and decoded log types.

use crate::types::NormalizedValue;
use serde::{Deserialize, Serialize};

/// Where a log entry originated on the ledger.
///
/// Copied verbatim from a `RawLog` into the `DecodedEvent` built from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Provenance {
    /// Contract address that emitted the log
    pub address: String,
    pub block_number: u64,
    pub block_hash: String,
    pub tx_hash: String,
    /// Transaction index within the block
    pub tx_index: u32,
    /// Log index within the block
    pub log_index: u32,
    /// True when the log was reverted by a chain reorganisation
    #[serde(default)]
    pub removed: bool,
}

impl Provenance {
    /// Identity of the underlying log, independent of its removed flag.
    pub fn log_key(&self) -> (String, String, u32) {
        (self.block_hash.clone(), self.tx_hash.clone(), self.log_index)
    }
}

/// An unparsed log entry as delivered by a `LogTransport`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    /// topics[0] is the event fingerprint; topics[1..] are indexed params.
    /// Each topic is a 32-byte word, hex with 0x prefix.
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed parameters.
    pub data: Vec<u8>,
    pub provenance: Provenance,
}

impl RawLog {
    pub fn event_signature(&self) -> Option<&str> {
        self.topics.first().map(|s| s.as_str())
    }
}

/// keccak256 of an event's canonical signature, i.e. the expected topics[0].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventFingerprint(pub String);

impl EventFingerprint {
    /// Hex is normalised to lowercase so lookups are case-insensitive.
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into().to_ascii_lowercase())
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A schema-validated reconstruction of one `RawLog`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Event kind, e.g. "Register"
    pub kind: String,
    /// Field values in descriptor declaration order
    pub fields: Vec<(String, NormalizedValue)>,
    pub provenance: Provenance,
    pub fingerprint: EventFingerprint,
}

impl DecodedEvent {
    pub fn field(&self, name: &str) -> Option<&NormalizedValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_lowercased() {
        let fp = EventFingerprint::new("0xA9D44D6E13BB3FEE938C3F66D1103E91F8DC6B12D4405A55EEA558E8F275AA6E");
        assert_eq!(
            fp.as_hex(),
            "0xa9d44d6e13bb3fee938c3f66d1103e91f8dc6b12d4405a55eea558e8f275aa6e"
        );
    }

    #[test]
    fn decoded_field_lookup_preserves_order() {
        let event = DecodedEvent {
            kind: "Register".into(),
            fields: vec![
                ("id".into(), NormalizedValue::Uint(1)),
                ("amount".into(), NormalizedValue::Uint(100)),
            ],
            provenance: Provenance::default(),
            fingerprint: EventFingerprint::new("0x01"),
        };
        assert_eq!(event.field("amount"), Some(&NormalizedValue::Uint(100)));
        assert!(event.field("from").is_none());
        assert_eq!(event.fields[0].0, "id");
    }
}
