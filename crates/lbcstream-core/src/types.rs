//! Canonical ABI types and decoded values.
//!
//! Descriptors declare field types as `CanonicalType`; codecs produce
//! `NormalizedValue`s so consumers never touch ABI-library types directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The ABI type of a single event field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalType {
    /// Unsigned integer (uint8 .. uint256). Width in bits.
    Uint(u16),
    /// Signed integer (int8 .. int256). Width in bits.
    Int(u16),
    Bool,
    /// Fixed-size byte array (bytes1 .. bytes32). Length in bytes.
    Bytes(u8),
    /// Variable-length byte array
    BytesVec,
    /// UTF-8 string
    Str,
    /// 20-byte account address
    Address,
    /// Fixed-length array of a type
    Array { elem: Box<CanonicalType>, len: u64 },
    /// Variable-length array of a type
    Vec(Box<CanonicalType>),
    /// Tuple / struct
    Tuple(Vec<CanonicalType>),
}

impl CanonicalType {
    /// Reference types are hashed when they appear as indexed topics.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            CanonicalType::Str
                | CanonicalType::BytesVec
                | CanonicalType::Vec(_)
                | CanonicalType::Array { .. }
                | CanonicalType::Tuple(_)
        )
    }
}

impl fmt::Display for CanonicalType {
    /// Renders the canonical ABI spelling used in event signatures.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalType::Uint(bits) => write!(f, "uint{bits}"),
            CanonicalType::Int(bits) => write!(f, "int{bits}"),
            CanonicalType::Bool => write!(f, "bool"),
            CanonicalType::Bytes(n) => write!(f, "bytes{n}"),
            CanonicalType::BytesVec => write!(f, "bytes"),
            CanonicalType::Str => write!(f, "string"),
            CanonicalType::Address => write!(f, "address"),
            CanonicalType::Array { elem, len } => write!(f, "{elem}[{len}]"),
            CanonicalType::Vec(elem) => write!(f, "{elem}[]"),
            CanonicalType::Tuple(elems) => {
                let parts: Vec<_> = elems.iter().map(|t| t.to_string()).collect();
                write!(f, "({})", parts.join(","))
            }
        }
    }
}

impl FromStr for CanonicalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(prefix) = s.strip_suffix(']') {
            let open = prefix
                .rfind('[')
                .ok_or_else(|| format!("unbalanced array brackets in '{s}'"))?;
            let elem: CanonicalType = prefix[..open].parse()?;
            let len = &prefix[open + 1..];
            return if len.is_empty() {
                Ok(CanonicalType::Vec(Box::new(elem)))
            } else {
                let len = len
                    .parse::<u64>()
                    .map_err(|_| format!("invalid array length in '{s}'"))?;
                Ok(CanonicalType::Array {
                    elem: Box::new(elem),
                    len,
                })
            };
        }

        if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            return split_top_level(inner)
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<_>, _>>()
                .map(CanonicalType::Tuple);
        }

        match s {
            "bool" => Ok(CanonicalType::Bool),
            "address" => Ok(CanonicalType::Address),
            "bytes" => Ok(CanonicalType::BytesVec),
            "string" => Ok(CanonicalType::Str),
            "uint" => Ok(CanonicalType::Uint(256)),
            "int" => Ok(CanonicalType::Int(256)),
            _ if s.starts_with("uint") => parse_width(&s[4..], s).map(CanonicalType::Uint),
            _ if s.starts_with("int") => parse_width(&s[3..], s).map(CanonicalType::Int),
            _ if s.starts_with("bytes") => match s[5..].parse::<u8>() {
                Ok(n) if (1..=32).contains(&n) => Ok(CanonicalType::Bytes(n)),
                _ => Err(format!("invalid fixed bytes type: '{s}'")),
            },
            _ => Err(format!("unknown type: '{s}'")),
        }
    }
}

fn parse_width(digits: &str, whole: &str) -> Result<u16, String> {
    match digits.parse::<u16>() {
        Ok(bits) if bits > 0 && bits <= 256 && bits % 8 == 0 => Ok(bits),
        _ => Err(format!("invalid integer width: '{whole}'")),
    }
}

/// Split a tuple body on commas that are not nested inside parentheses.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum NormalizedValue {
    Uint(u128),
    /// Large uints (> u128) stored as decimal string
    BigUint(String),
    Int(i128),
    /// Large ints (> i128) stored as decimal string
    BigInt(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Str(String),
    /// 20-byte address, lowercase hex with 0x prefix
    Address(String),
    Array(Vec<NormalizedValue>),
    Tuple(Vec<NormalizedValue>),
    Null,
}

impl NormalizedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, NormalizedValue::Null)
    }

    pub fn as_address(&self) -> Option<&str> {
        match self {
            NormalizedValue::Address(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            NormalizedValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            NormalizedValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NormalizedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            NormalizedValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Parse a textual value (e.g. from a command line) according to `ty`.
    ///
    /// Integers are decimal, or hex with a `0x` prefix; byte types are hex.
    pub fn parse_typed(ty: &CanonicalType, s: &str) -> Result<Self, String> {
        let s = s.trim();
        match ty {
            CanonicalType::Bool => s
                .parse::<bool>()
                .map(NormalizedValue::Bool)
                .map_err(|_| format!("expected bool, got '{s}'")),
            CanonicalType::Uint(_) => {
                let parsed = match s.strip_prefix("0x") {
                    Some(h) => u128::from_str_radix(h, 16),
                    None => s.parse::<u128>(),
                };
                match parsed {
                    Ok(v) => Ok(NormalizedValue::Uint(v)),
                    Err(_) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
                        Ok(NormalizedValue::BigUint(s.to_string()))
                    }
                    Err(_) => Err(format!("expected unsigned integer, got '{s}'")),
                }
            }
            CanonicalType::Int(_) => match s.parse::<i128>() {
                Ok(v) => Ok(NormalizedValue::Int(v)),
                Err(_) => {
                    let digits = s.strip_prefix('-').unwrap_or(s);
                    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                        Ok(NormalizedValue::BigInt(s.to_string()))
                    } else {
                        Err(format!("expected signed integer, got '{s}'"))
                    }
                }
            },
            CanonicalType::Address => {
                let hex = s.strip_prefix("0x").unwrap_or(s);
                if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    Ok(NormalizedValue::Address(format!("0x{}", hex.to_ascii_lowercase())))
                } else {
                    Err(format!("expected 20-byte hex address, got '{s}'"))
                }
            }
            CanonicalType::Bytes(n) => {
                let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
                    .map_err(|e| format!("invalid hex '{s}': {e}"))?;
                if bytes.len() != *n as usize {
                    return Err(format!("expected {n} bytes, got {}", bytes.len()));
                }
                Ok(NormalizedValue::Bytes(bytes))
            }
            CanonicalType::BytesVec => hex::decode(s.strip_prefix("0x").unwrap_or(s))
                .map(NormalizedValue::Bytes)
                .map_err(|e| format!("invalid hex '{s}': {e}")),
            CanonicalType::Str => Ok(NormalizedValue::Str(s.to_string())),
            other => Err(format!("cannot parse a {other} value from text")),
        }
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::Uint(v) => write!(f, "{v}"),
            NormalizedValue::BigUint(v) => write!(f, "{v}"),
            NormalizedValue::Int(v) => write!(f, "{v}"),
            NormalizedValue::BigInt(v) => write!(f, "{v}"),
            NormalizedValue::Bool(v) => write!(f, "{v}"),
            NormalizedValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            NormalizedValue::Str(s) => write!(f, "{s}"),
            NormalizedValue::Address(a) => write!(f, "{a}"),
            NormalizedValue::Array(v) | NormalizedValue::Tuple(v) => {
                let parts: Vec<_> = v.iter().map(|x| x.to_string()).collect();
                if matches!(self, NormalizedValue::Array(_)) {
                    write!(f, "[{}]", parts.join(", "))
                } else {
                    write!(f, "({})", parts.join(", "))
                }
            }
            NormalizedValue::Null => write!(f, "null"),
        }
    }
}
