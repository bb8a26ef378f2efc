//! Caller-facing subscription criteria and the wire-level log filter
//! they compile into.

use crate::types::NormalizedValue;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Restricts an indexed field to any of a set of values.
/// An empty set matches everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPredicate {
    pub field: String,
    pub any_of: Vec<NormalizedValue>,
}

/// What a caller wants to consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionCriteria {
    /// Event kinds to match (at least one)
    pub kinds: Vec<String>,
    /// Emitting contract; `None` matches any address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_block: Option<u64>,
    /// `None` means "up to the latest block"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_block: Option<u64>,
    #[serde(default)]
    pub predicates: Vec<IndexedPredicate>,
}

impl SubscriptionCriteria {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kinds: vec![kind.into()],
            ..Default::default()
        }
    }

    /// Also match another event kind.
    pub fn or_kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }

    pub fn at_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = Some(block);
        self
    }

    pub fn to_block(mut self, block: u64) -> Self {
        self.to_block = Some(block);
        self
    }

    /// Only match entries whose indexed `field` equals one of `values`.
    pub fn where_indexed(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = NormalizedValue>,
    ) -> Self {
        self.predicates.push(IndexedPredicate {
            field: field.into(),
            any_of: values.into_iter().collect(),
        });
        self
    }
}

/// An `eth_getLogs` / `eth_subscribe("logs")` filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub addresses: Vec<String>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    /// Per-position topic alternatives; `None` is a wildcard.
    pub topics: Vec<Option<Vec<String>>>,
}

impl LogFilter {
    /// Copy of this filter restricted to `[from, to]`.
    pub fn with_range(&self, from: u64, to: u64) -> Self {
        Self {
            from_block: Some(from),
            to_block: Some(to),
            ..self.clone()
        }
    }

    /// JSON-RPC filter object. Block bounds are omitted for subscriptions.
    pub fn to_json(&self, include_range: bool) -> Value {
        let mut obj = serde_json::Map::new();
        match self.addresses.len() {
            0 => {}
            1 => {
                obj.insert("address".into(), json!(self.addresses[0]));
            }
            _ => {
                obj.insert("address".into(), json!(self.addresses));
            }
        }
        if include_range {
            if let Some(from) = self.from_block {
                obj.insert("fromBlock".into(), json!(format!("0x{from:x}")));
            }
            obj.insert(
                "toBlock".into(),
                match self.to_block {
                    Some(to) => json!(format!("0x{to:x}")),
                    None => json!("latest"),
                },
            );
        }

        let mut topics = self.topics.clone();
        while matches!(topics.last(), Some(None)) {
            topics.pop();
        }
        if !topics.is_empty() {
            let topics: Vec<Value> = topics
                .into_iter()
                .map(|t| match t {
                    None => Value::Null,
                    Some(alts) if alts.len() == 1 => json!(alts[0]),
                    Some(alts) => json!(alts),
                })
                .collect();
            obj.insert("topics".into(), Value::Array(topics));
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_builder() {
        let c = SubscriptionCriteria::new("PegOutDeposit")
            .or_kind("PegOutRefunded")
            .at_address("0xabc")
            .from_block(10)
            .where_indexed("quoteHash", vec![NormalizedValue::Bytes(vec![1; 32])]);
        assert_eq!(c.kinds, vec!["PegOutDeposit", "PegOutRefunded"]);
        assert_eq!(c.address.as_deref(), Some("0xabc"));
        assert_eq!(c.from_block, Some(10));
        assert_eq!(c.to_block, None);
        assert_eq!(c.predicates.len(), 1);
    }

    #[test]
    fn filter_json_trims_trailing_wildcards() {
        let f = LogFilter {
            addresses: vec!["0xabc".into()],
            from_block: Some(16),
            to_block: None,
            topics: vec![Some(vec!["0x01".into()]), None, None],
        };
        let v = f.to_json(true);
        assert_eq!(v["address"], "0xabc");
        assert_eq!(v["fromBlock"], "0x10");
        assert_eq!(v["toBlock"], "latest");
        assert_eq!(v["topics"], json!(["0x01"]));
    }

    #[test]
    fn filter_json_keeps_inner_wildcards_and_alternatives() {
        let f = LogFilter {
            addresses: vec![],
            from_block: None,
            to_block: None,
            topics: vec![
                Some(vec!["0x01".into(), "0x02".into()]),
                None,
                Some(vec!["0x03".into()]),
            ],
        };
        let v = f.to_json(false);
        assert!(v.get("address").is_none());
        assert!(v.get("toBlock").is_none());
        assert_eq!(v["topics"], json!([["0x01", "0x02"], null, "0x03"]));
    }
}
