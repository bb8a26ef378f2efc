//! Conversions between alloy `DynSolValue` and lbcstream `NormalizedValue`.

use std::str::FromStr;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, FixedBytes, I256, U256};
use lbcstream_core::{
    error::{DecodeError, EncodeError},
    types::{CanonicalType, NormalizedValue},
};

/// Build the alloy `DynSolType` for a `CanonicalType`.
pub fn canonical_to_dyn(ty: &CanonicalType) -> DynSolType {
    match ty {
        CanonicalType::Uint(bits) => DynSolType::Uint(*bits as usize),
        CanonicalType::Int(bits) => DynSolType::Int(*bits as usize),
        CanonicalType::Bool => DynSolType::Bool,
        CanonicalType::Bytes(n) => DynSolType::FixedBytes(*n as usize),
        CanonicalType::BytesVec => DynSolType::Bytes,
        CanonicalType::Str => DynSolType::String,
        CanonicalType::Address => DynSolType::Address,
        CanonicalType::Array { elem, len } => {
            DynSolType::FixedArray(Box::new(canonical_to_dyn(elem)), *len as usize)
        }
        CanonicalType::Vec(elem) => DynSolType::Array(Box::new(canonical_to_dyn(elem))),
        CanonicalType::Tuple(elems) => DynSolType::Tuple(elems.iter().map(canonical_to_dyn).collect()),
    }
}

/// Convert a decoded `DynSolValue` into a `NormalizedValue`.
///
/// Integers that fit 128 bits stay numeric whatever their declared width;
/// wider values become decimal strings.
pub fn normalize(val: DynSolValue) -> NormalizedValue {
    match val {
        DynSolValue::Bool(b) => NormalizedValue::Bool(b),

        DynSolValue::Int(i, _bits) => match i128::try_from(i) {
            Ok(v) => NormalizedValue::Int(v),
            Err(_) => NormalizedValue::BigInt(i.to_string()),
        },

        DynSolValue::Uint(u, _bits) => match u128::try_from(u) {
            Ok(v) => NormalizedValue::Uint(v),
            Err(_) => NormalizedValue::BigUint(u.to_string()),
        },

        DynSolValue::FixedBytes(word, size) => NormalizedValue::Bytes(word[..size].to_vec()),

        DynSolValue::Bytes(b) => NormalizedValue::Bytes(b),

        DynSolValue::String(s) => NormalizedValue::Str(s),

        // lowercase hex, no checksum
        DynSolValue::Address(a) => NormalizedValue::Address(format!("{a:#x}")),

        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            NormalizedValue::Array(vals.into_iter().map(normalize).collect())
        }

        DynSolValue::Tuple(vals) => NormalizedValue::Tuple(vals.into_iter().map(normalize).collect()),

        DynSolValue::Function(f) => NormalizedValue::Bytes(f.to_vec()),
    }
}

/// Convert a `NormalizedValue` into the `DynSolValue` of the expected type.
pub fn to_dyn_value(val: &NormalizedValue, expected: &DynSolType) -> Result<DynSolValue, EncodeError> {
    let mismatch = || EncodeError::TypeMismatch {
        ty: expected.sol_type_name().into_owned(),
        value: val.to_string(),
    };
    let invalid = |reason: String| EncodeError::InvalidValue { reason };

    match (val, expected) {
        (NormalizedValue::Bool(b), DynSolType::Bool) => Ok(DynSolValue::Bool(*b)),

        (NormalizedValue::Uint(u), DynSolType::Uint(bits)) => {
            let u = U256::from(*u);
            check_uint_width(u, *bits).ok_or_else(mismatch)?;
            Ok(DynSolValue::Uint(u, *bits))
        }
        (NormalizedValue::BigUint(s), DynSolType::Uint(bits)) => {
            let u = U256::from_str(s).map_err(|e| invalid(format!("uint parse: {e}")))?;
            check_uint_width(u, *bits).ok_or_else(mismatch)?;
            Ok(DynSolValue::Uint(u, *bits))
        }

        (NormalizedValue::Int(i), DynSolType::Int(bits)) => {
            let i = I256::try_from(*i).map_err(|e| invalid(e.to_string()))?;
            Ok(DynSolValue::Int(i, *bits))
        }
        (NormalizedValue::BigInt(s), DynSolType::Int(bits)) => {
            let i = I256::from_dec_str(s).map_err(|e| invalid(format!("int parse: {e}")))?;
            Ok(DynSolValue::Int(i, *bits))
        }

        (NormalizedValue::Address(s), DynSolType::Address) => {
            let addr = Address::from_str(s).map_err(|e| invalid(format!("address parse: {e}")))?;
            Ok(DynSolValue::Address(addr))
        }

        (NormalizedValue::Bytes(b), DynSolType::Bytes) => Ok(DynSolValue::Bytes(b.clone())),

        (NormalizedValue::Bytes(b), DynSolType::FixedBytes(n)) => {
            if b.len() != *n {
                return Err(invalid(format!("bytes{n}: got {} bytes", b.len())));
            }
            let mut word = [0u8; 32];
            word[..*n].copy_from_slice(b);
            Ok(DynSolValue::FixedBytes(FixedBytes::from(word), *n))
        }

        (NormalizedValue::Str(s), DynSolType::String) => Ok(DynSolValue::String(s.clone())),

        (NormalizedValue::Array(elems), DynSolType::Array(inner)) => elems
            .iter()
            .map(|e| to_dyn_value(e, inner))
            .collect::<Result<Vec<_>, _>>()
            .map(DynSolValue::Array),

        (NormalizedValue::Array(elems), DynSolType::FixedArray(inner, len)) => {
            if elems.len() != *len {
                return Err(invalid(format!(
                    "fixed array length mismatch: expected {len}, got {}",
                    elems.len()
                )));
            }
            elems
                .iter()
                .map(|e| to_dyn_value(e, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::FixedArray)
        }

        (NormalizedValue::Tuple(elems), DynSolType::Tuple(types)) => {
            if elems.len() != types.len() {
                return Err(mismatch());
            }
            elems
                .iter()
                .zip(types)
                .map(|(v, t)| to_dyn_value(v, t))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Tuple)
        }

        _ => Err(mismatch()),
    }
}

fn check_uint_width(u: U256, bits: usize) -> Option<()> {
    (bits >= 256 || u.bit_len() <= bits).then_some(())
}

/// Strip `0x` and decode one 32-byte topic word.
pub fn topic_word(field: &str, topic: &str) -> Result<[u8; 32], DecodeError> {
    let hex = topic.strip_prefix("0x").unwrap_or(topic);
    let bytes = hex::decode(hex).map_err(|e| DecodeError::InvalidTopic {
        field: field.to_string(),
        reason: format!("invalid hex: {e}"),
    })?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| DecodeError::InvalidTopic {
        field: field.to_string(),
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_bool() {
        assert_eq!(normalize(DynSolValue::Bool(true)), NormalizedValue::Bool(true));
    }

    #[test]
    fn normalize_uint256_small_stays_numeric() {
        let v = normalize(DynSolValue::Uint(U256::from(42u64), 256));
        assert_eq!(v, NormalizedValue::Uint(42));
    }

    #[test]
    fn normalize_uint256_max_is_decimal_string() {
        let v = normalize(DynSolValue::Uint(U256::MAX, 256));
        assert_eq!(v, NormalizedValue::BigUint(U256::MAX.to_string()));
    }

    #[test]
    fn normalize_negative_int() {
        let v = normalize(DynSolValue::Int(I256::try_from(-7i64).unwrap(), 256));
        assert_eq!(v, NormalizedValue::Int(-7));
    }

    #[test]
    fn normalize_address_is_lowercase() {
        let addr: Address = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".parse().unwrap();
        let v = normalize(DynSolValue::Address(addr));
        assert_eq!(
            v,
            NormalizedValue::Address("0xd8da6bf26964af9d7eed9e03e53415d37aa96045".into())
        );
    }

    #[test]
    fn fixed_bytes_keep_declared_width() {
        let v = normalize(DynSolValue::FixedBytes(FixedBytes::from([0xab; 32]), 4));
        assert_eq!(v, NormalizedValue::Bytes(vec![0xab; 4]));
    }

    #[test]
    fn uint_wider_than_declared_is_rejected() {
        let err = to_dyn_value(&NormalizedValue::Uint(256), &DynSolType::Uint(8)).unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch { .. }));
    }

    #[test]
    fn short_fixed_bytes_are_rejected() {
        let err = to_dyn_value(&NormalizedValue::Bytes(vec![1, 2]), &DynSolType::FixedBytes(32)).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidValue { .. }));
    }

    #[test]
    fn topic_word_rejects_wrong_length() {
        assert!(topic_word("from", "0x1234").is_err());
        assert!(topic_word("from", &format!("0x{}", "00".repeat(32))).is_ok());
    }
}
