//! Compiling `SubscriptionCriteria` into a wire filter plus the decode step
//! both consumers share.

use std::collections::HashMap;
use std::sync::Arc;

use lbcstream_core::{
    codec::ValueCodec,
    descriptor::{EventDescriptor, FieldDef},
    error::{DecodeError, StreamError},
    event::{DecodedEvent, RawLog},
    filter::{LogFilter, SubscriptionCriteria},
};
use lbcstream_registry::EventRegistry;

use crate::config::is_address;

/// Decodes raw logs for a fixed set of event kinds.
///
/// topics[0] selects the descriptor; a log of any other kind is a decode
/// error rather than being skipped.
#[derive(Clone)]
pub struct EventDecoder {
    /// fingerprint hex → descriptor
    descriptors: HashMap<String, EventDescriptor>,
    codec: Arc<dyn ValueCodec>,
}

impl EventDecoder {
    pub fn new(descriptors: Vec<EventDescriptor>, codec: Arc<dyn ValueCodec>) -> Self {
        Self {
            descriptors: descriptors
                .into_iter()
                .map(|d| (d.fingerprint.as_hex().to_string(), d))
                .collect(),
            codec,
        }
    }

    pub fn decode(&self, raw: &RawLog) -> Result<DecodedEvent, DecodeError> {
        let topic0 = raw.event_signature().ok_or(DecodeError::MissingSignature)?;
        let descriptor = self
            .descriptors
            .get(&topic0.to_ascii_lowercase())
            .ok_or_else(|| DecodeError::UnexpectedEvent {
                fingerprint: topic0.to_string(),
            })?;
        self.codec.decode_log(descriptor, raw)
    }

    /// Kinds this decoder accepts, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.descriptors.values().map(|d| d.kind.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for EventDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDecoder").field("kinds", &self.kinds()).finish()
    }
}

/// Criteria resolved against the registry.
#[derive(Debug, Clone)]
pub struct CompiledCriteria {
    pub filter: LogFilter,
    pub decoder: EventDecoder,
}

/// Resolve kinds, build topic alternatives and encode indexed predicates.
///
/// `default_address` applies when the criteria name no address.
pub fn compile(
    criteria: &SubscriptionCriteria,
    registry: &EventRegistry,
    codec: Arc<dyn ValueCodec>,
    default_address: Option<&str>,
) -> Result<CompiledCriteria, StreamError> {
    if criteria.kinds.is_empty() {
        return Err(StreamError::InvalidCriteria("no event kind selected".into()));
    }

    let mut descriptors: Vec<EventDescriptor> = Vec::with_capacity(criteria.kinds.len());
    for kind in &criteria.kinds {
        if descriptors.iter().any(|d| &d.kind == kind) {
            continue;
        }
        descriptors.push(registry.lookup(kind)?.clone());
    }

    if let (Some(from), Some(to)) = (criteria.from_block, criteria.to_block) {
        if from > to {
            return Err(StreamError::InvalidCriteria(format!(
                "from_block {from} is after to_block {to}"
            )));
        }
    }

    let addresses = match criteria.address.as_deref().or(default_address) {
        Some(addr) if is_address(addr) => vec![addr.to_ascii_lowercase()],
        Some(addr) => {
            return Err(StreamError::InvalidCriteria(format!("invalid address '{addr}'")))
        }
        None => vec![],
    };

    let mut topics: Vec<Option<Vec<String>>> = vec![Some(
        descriptors.iter().map(|d| d.fingerprint.to_string()).collect(),
    )];

    for predicate in &criteria.predicates {
        let (position, field) = indexed_position(&descriptors, &predicate.field)?;
        if topics.len() <= position {
            topics.resize(position + 1, None);
        }
        if topics[position].is_some() {
            return Err(StreamError::InvalidCriteria(format!(
                "field '{}' constrained twice",
                predicate.field
            )));
        }
        if predicate.any_of.is_empty() {
            continue;
        }
        let words = predicate
            .any_of
            .iter()
            .map(|v| codec.encode_topic(field, v))
            .collect::<Result<Vec<_>, _>>()?;
        topics[position] = Some(words);
    }

    Ok(CompiledCriteria {
        filter: LogFilter {
            addresses,
            from_block: Some(criteria.from_block.unwrap_or(0)),
            to_block: criteria.to_block,
            topics,
        },
        decoder: EventDecoder::new(descriptors, codec),
    })
}

/// Topic position of `field`, which must be indexed with the same type and
/// position in every selected kind.
fn indexed_position<'a>(
    descriptors: &'a [EventDescriptor],
    field: &str,
) -> Result<(usize, &'a FieldDef), StreamError> {
    let mut found: Option<(usize, &FieldDef)> = None;
    for d in descriptors {
        let def = d.field(field).ok_or_else(|| {
            StreamError::InvalidCriteria(format!("'{}' has no field '{field}'", d.kind))
        })?;
        let position = d.topic_position(field).ok_or_else(|| {
            StreamError::InvalidCriteria(format!("field '{field}' of '{}' is not indexed", d.kind))
        })?;
        match found {
            None => found = Some((position, def)),
            Some((p, first)) if p == position && first.ty == def.ty => {}
            Some(_) => {
                return Err(StreamError::InvalidCriteria(format!(
                    "field '{field}' is not at the same topic position in every selected kind"
                )))
            }
        }
    }
    found.ok_or_else(|| StreamError::InvalidCriteria("no event kind selected".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbcstream_core::types::NormalizedValue;
    use lbcstream_evm::EvmCodec;
    use lbcstream_registry::lbc_registry;

    fn codec() -> Arc<dyn ValueCodec> {
        Arc::new(EvmCodec)
    }

    const PEGOUT_DEPOSIT: &str = "0xb1bc7bfc0dab19777eb03aa0a5643378fc9f186c8fc5a36620d21136fbea570f";
    const PEGOUT_REFUNDED: &str = "0xb781856ec73fd0dc39351043d1634ea22cd3277b0866ab93e7ec1801766bb384";

    #[test]
    fn single_kind_filter() {
        let reg = lbc_registry().unwrap();
        let c = compile(&SubscriptionCriteria::new("PegOutDeposit"), &reg, codec(), None).unwrap();
        assert_eq!(c.filter.topics, vec![Some(vec![PEGOUT_DEPOSIT.to_string()])]);
        assert_eq!(c.filter.from_block, Some(0));
        assert!(c.filter.addresses.is_empty());
        assert_eq!(c.decoder.kinds(), vec!["PegOutDeposit"]);
    }

    #[test]
    fn multi_kind_shares_topic0_alternatives() {
        let reg = lbc_registry().unwrap();
        let criteria = SubscriptionCriteria::new("PegOutDeposit")
            .or_kind("PegOutRefunded")
            .or_kind("PegOutDeposit");
        let c = compile(&criteria, &reg, codec(), None).unwrap();
        assert_eq!(
            c.filter.topics[0],
            Some(vec![PEGOUT_DEPOSIT.to_string(), PEGOUT_REFUNDED.to_string()])
        );
    }

    #[test]
    fn shared_indexed_predicate_across_kinds() {
        let reg = lbc_registry().unwrap();
        let criteria = SubscriptionCriteria::new("PegOutDeposit")
            .or_kind("PegOutRefunded")
            .where_indexed("quoteHash", vec![NormalizedValue::Bytes(vec![0x42; 32])]);
        let c = compile(&criteria, &reg, codec(), None).unwrap();
        assert_eq!(c.filter.topics[1], Some(vec![format!("0x{}", "42".repeat(32))]));
    }

    #[test]
    fn predicate_on_second_indexed_field_leaves_wildcard() {
        let reg = lbc_registry().unwrap();
        let sender = format!("0x{}", "ab".repeat(20));
        let criteria = SubscriptionCriteria::new("PegOutDeposit")
            .where_indexed("sender", vec![NormalizedValue::Address(sender)]);
        let c = compile(&criteria, &reg, codec(), None).unwrap();
        assert_eq!(c.filter.topics.len(), 3);
        assert_eq!(c.filter.topics[1], None);
        assert_eq!(
            c.filter.topics[2],
            Some(vec![format!("0x{}{}", "00".repeat(12), "ab".repeat(20))])
        );
    }

    #[test]
    fn empty_predicate_is_wildcard() {
        let reg = lbc_registry().unwrap();
        let criteria = SubscriptionCriteria::new("Register").where_indexed("from", vec![]);
        let c = compile(&criteria, &reg, codec(), None).unwrap();
        assert_eq!(c.filter.topics.len(), 2);
        assert_eq!(c.filter.topics[1], None);
    }

    #[test]
    fn unknown_kind() {
        let reg = lbc_registry().unwrap();
        let err = compile(&SubscriptionCriteria::new("Nope"), &reg, codec(), None).unwrap_err();
        assert_eq!(err, StreamError::UnknownEventKind { kind: "Nope".into() });
    }

    #[test]
    fn predicate_on_data_field_is_invalid() {
        let reg = lbc_registry().unwrap();
        let criteria = SubscriptionCriteria::new("Register")
            .where_indexed("amount", vec![NormalizedValue::Uint(1)]);
        let err = compile(&criteria, &reg, codec(), None).unwrap_err();
        assert!(matches!(err, StreamError::InvalidCriteria(_)));
    }

    #[test]
    fn empty_kinds_and_inverted_range_are_invalid() {
        let reg = lbc_registry().unwrap();
        let err = compile(&SubscriptionCriteria::default(), &reg, codec(), None).unwrap_err();
        assert!(matches!(err, StreamError::InvalidCriteria(_)));

        let criteria = SubscriptionCriteria::new("Register").from_block(10).to_block(5);
        let err = compile(&criteria, &reg, codec(), None).unwrap_err();
        assert!(matches!(err, StreamError::InvalidCriteria(_)));
    }

    #[test]
    fn default_address_applies_and_is_lowercased() {
        let reg = lbc_registry().unwrap();
        let addr = "0xC2A630C053D12D63D32B025082F6BA268DB18300";
        let c = compile(&SubscriptionCriteria::new("Register"), &reg, codec(), Some(addr)).unwrap();
        assert_eq!(c.filter.addresses, vec![addr.to_ascii_lowercase()]);
    }

    #[test]
    fn decoder_rejects_foreign_kind() {
        let reg = lbc_registry().unwrap();
        let c = compile(&SubscriptionCriteria::new("Register"), &reg, codec(), None).unwrap();
        let raw = RawLog {
            topics: vec![PEGOUT_REFUNDED.to_string()],
            data: vec![],
            provenance: Default::default(),
        };
        assert!(matches!(
            c.decoder.decode(&raw),
            Err(DecodeError::UnexpectedEvent { .. })
        ));
    }
}
