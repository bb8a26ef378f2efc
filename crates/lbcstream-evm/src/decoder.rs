//! `EvmCodec`: the `ValueCodec` implementation for EVM logs.
//!
//! Decoding is strict: topic0 must equal the descriptor's fingerprint, the
//! topic count must match the indexed field count, and the data payload
//! must hold every non-indexed field. Any violation fails the whole log.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::keccak256;
use lbcstream_core::{
    codec::ValueCodec,
    descriptor::{EventDescriptor, FieldDef},
    error::{DecodeError, EncodeError},
    event::{DecodedEvent, RawLog},
    types::{CanonicalType, NormalizedValue},
};

use crate::{fingerprint, normalizer};

/// Stateless EVM log codec. Cheap to clone and share.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvmCodec;

impl EvmCodec {
    pub fn new() -> Self {
        Self
    }

    /// Decode the non-indexed fields from the ABI-encoded data payload.
    fn decode_data(
        &self,
        data: &[u8],
        data_fields: &[(&str, &FieldDef)],
    ) -> Result<Vec<NormalizedValue>, DecodeError> {
        if data_fields.is_empty() {
            return Ok(Vec::new());
        }

        let tuple_type = DynSolType::Tuple(
            data_fields
                .iter()
                .map(|(_, f)| normalizer::canonical_to_dyn(&f.ty))
                .collect(),
        );
        let decoded = tuple_type
            .abi_decode_params(data)
            .map_err(|e| DecodeError::AbiDecodeFailed {
                reason: e.to_string(),
            })?;

        let values = match decoded {
            DynSolValue::Tuple(vals) => vals,
            other => vec![other],
        };
        if values.len() != data_fields.len() {
            return Err(DecodeError::AbiDecodeFailed {
                reason: format!(
                    "expected {} data fields, decoded {}",
                    data_fields.len(),
                    values.len()
                ),
            });
        }
        Ok(values.into_iter().map(normalizer::normalize).collect())
    }

    /// Decode one indexed topic.
    ///
    /// Reference types (string, bytes, arrays, tuples) are stored as the
    /// keccak256 of their encoding, so only the 32-byte hash is returned.
    fn decode_topic(
        &self,
        name: &str,
        topic: &str,
        ty: &CanonicalType,
    ) -> Result<NormalizedValue, DecodeError> {
        let word = normalizer::topic_word(name, topic)?;
        if ty.is_reference() {
            return Ok(NormalizedValue::Bytes(word.to_vec()));
        }
        normalizer::canonical_to_dyn(ty)
            .abi_decode(&word)
            .map(normalizer::normalize)
            .map_err(|e| DecodeError::InvalidTopic {
                field: name.to_string(),
                reason: e.to_string(),
            })
    }
}

impl ValueCodec for EvmCodec {
    fn decode_log(
        &self,
        descriptor: &EventDescriptor,
        raw: &RawLog,
    ) -> Result<DecodedEvent, DecodeError> {
        if raw.topics.is_empty() {
            return Err(DecodeError::MissingSignature);
        }
        let got = fingerprint::from_topics(&raw.topics).ok_or_else(|| DecodeError::InvalidTopic {
            field: "topic0".into(),
            reason: format!("not a 32-byte word: {}", raw.topics[0]),
        })?;
        if got != descriptor.fingerprint {
            return Err(DecodeError::SignatureMismatch {
                expected: descriptor.fingerprint.to_string(),
                got: got.to_string(),
            });
        }

        let indexed = descriptor.indexed_fields();
        let topics = &raw.topics[1..];
        if topics.len() > indexed.len() {
            return Err(DecodeError::InvalidTopic {
                field: "topics".into(),
                reason: format!(
                    "expected {} indexed topics, got {}",
                    indexed.len(),
                    topics.len()
                ),
            });
        }

        let mut indexed_values = Vec::with_capacity(indexed.len());
        for (i, (name, field)) in indexed.iter().enumerate() {
            let topic = topics.get(i).ok_or_else(|| DecodeError::MissingTopic {
                field: name.to_string(),
            })?;
            indexed_values.push(self.decode_topic(name, topic, &field.ty)?);
        }
        let data_values = self.decode_data(&raw.data, &descriptor.data_fields())?;

        // Re-interleave in declaration order.
        let mut indexed_values = indexed_values.into_iter();
        let mut data_values = data_values.into_iter();
        let mut fields = Vec::with_capacity(descriptor.fields.len());
        for (name, field) in &descriptor.fields {
            let value = if field.indexed {
                indexed_values.next()
            } else {
                data_values.next()
            };
            fields.push((name.clone(), value.unwrap_or(NormalizedValue::Null)));
        }

        Ok(DecodedEvent {
            kind: descriptor.kind.clone(),
            fields,
            provenance: raw.provenance.clone(),
            fingerprint: descriptor.fingerprint.clone(),
        })
    }

    fn encode_topic(&self, field: &FieldDef, value: &NormalizedValue) -> Result<String, EncodeError> {
        let word: Vec<u8> = match (&field.ty, value) {
            // Indexed strings and byte strings are stored as keccak256(preimage).
            (CanonicalType::Str, NormalizedValue::Str(s)) => keccak256(s.as_bytes()).to_vec(),
            (CanonicalType::BytesVec, NormalizedValue::Bytes(b)) => keccak256(b).to_vec(),
            (ty, _) if ty.is_reference() => {
                return Err(EncodeError::InvalidValue {
                    reason: format!("cannot build a topic predicate for indexed {ty}"),
                })
            }
            (ty, value) => {
                let dyn_value = normalizer::to_dyn_value(value, &normalizer::canonical_to_dyn(ty))?;
                DynSolValue::Tuple(vec![dyn_value]).abi_encode()
            }
        };
        if word.len() != 32 {
            return Err(EncodeError::InvalidValue {
                reason: format!("topic word must be 32 bytes, got {}", word.len()),
            });
        }
        Ok(format!("0x{}", hex::encode(word)))
    }
}
