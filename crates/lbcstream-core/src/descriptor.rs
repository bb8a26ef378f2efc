//! Event descriptors: the static shape of one contract event kind.

use crate::event::EventFingerprint;
use crate::types::CanonicalType;
use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

/// Definition of a single field within an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub ty: CanonicalType,
    /// Indexed fields travel in topics[1..] instead of the data payload.
    pub indexed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The decode schema for one event kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Registry key, e.g. "PegOutDeposit"
    pub kind: String,
    /// Solidity event name used in the signature
    pub event: String,
    pub fingerprint: EventFingerprint,
    /// Ordered field definitions (order matters for ABI decode)
    pub fields: Vec<(String, FieldDef)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EventDescriptor {
    /// Build a descriptor whose fingerprint is computed from its signature.
    pub fn new(kind: impl Into<String>, event: impl Into<String>, fields: Vec<(String, FieldDef)>) -> Self {
        let mut descriptor = Self {
            kind: kind.into(),
            event: event.into(),
            fingerprint: EventFingerprint::new(String::new()),
            fields,
            description: None,
        };
        descriptor.fingerprint = descriptor.compute_fingerprint();
        descriptor
    }

    /// Canonical signature, e.g. `Register(uint256,address,uint256)`.
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.fields.iter().map(|(_, f)| f.ty.to_string()).collect();
        format!("{}({})", self.event, types.join(","))
    }

    /// keccak256 of the canonical signature.
    pub fn compute_fingerprint(&self) -> EventFingerprint {
        keccak256_signature(&self.signature())
    }

    /// Indexed fields in declaration order; element `i` lives in topics[i + 1].
    pub fn indexed_fields(&self) -> Vec<(&str, &FieldDef)> {
        self.fields
            .iter()
            .filter(|(_, f)| f.indexed)
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }

    /// Non-indexed fields, ABI-encoded together in the data payload.
    pub fn data_fields(&self) -> Vec<(&str, &FieldDef)> {
        self.fields
            .iter()
            .filter(|(_, f)| !f.indexed)
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Topic position of an indexed field (1-based; topic 0 is the fingerprint).
    pub fn topic_position(&self, name: &str) -> Option<usize> {
        self.indexed_fields()
            .iter()
            .position(|(n, _)| *n == name)
            .map(|i| i + 1)
    }
}

/// keccak256 of an event signature string, as a 0x-prefixed hex fingerprint.
pub fn keccak256_signature(signature: &str) -> EventFingerprint {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    EventFingerprint::new(format!("0x{}", hex::encode(output)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(ty: CanonicalType, indexed: bool) -> FieldDef {
        FieldDef {
            ty,
            indexed,
            description: None,
        }
    }

    fn pegout_deposit() -> EventDescriptor {
        EventDescriptor::new(
            "PegOutDeposit",
            "PegOutDeposit",
            vec![
                ("quoteHash".into(), field(CanonicalType::Bytes(32), true)),
                ("sender".into(), field(CanonicalType::Address, true)),
                ("amount".into(), field(CanonicalType::Uint(256), false)),
                ("timestamp".into(), field(CanonicalType::Uint(256), false)),
            ],
        )
    }

    #[test]
    fn erc20_transfer_fingerprint() {
        let fp = keccak256_signature("Transfer(address,address,uint256)");
        assert_eq!(
            fp.as_hex(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn signature_and_fingerprint() {
        let d = pegout_deposit();
        assert_eq!(d.signature(), "PegOutDeposit(bytes32,address,uint256,uint256)");
        assert_eq!(
            d.fingerprint.as_hex(),
            "0xb1bc7bfc0dab19777eb03aa0a5643378fc9f186c8fc5a36620d21136fbea570f"
        );
    }

    #[test]
    fn indexed_and_data_split() {
        let d = pegout_deposit();
        assert_eq!(d.indexed_fields().len(), 2);
        assert_eq!(d.data_fields().len(), 2);
        assert_eq!(d.topic_position("quoteHash"), Some(1));
        assert_eq!(d.topic_position("sender"), Some(2));
        assert_eq!(d.topic_position("amount"), None);
    }
}
