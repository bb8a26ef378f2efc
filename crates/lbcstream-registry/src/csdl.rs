//! CSDL parser for contract event descriptors.
//!
//! CSDL is a small YAML dialect: one `schema <Kind>:` document per event
//! kind, separated by `---`. The field map keeps YAML declaration order,
//! which is the ABI order the decoder relies on.
//!
//! ```yaml
//! schema PegOutDeposit:
//!   event: PegOutDeposit
//!   fingerprint: "0xb1bc…570f"
//!   fields:
//!     quoteHash: { type: bytes32, indexed: true }
//!     sender:    { type: address, indexed: true }
//!     amount:    { type: uint256 }
//!     timestamp: { type: uint256 }
//! ```

use indexmap::IndexMap;
use lbcstream_core::{
    error::RegistryError,
    event::EventFingerprint,
    descriptor::{EventDescriptor, FieldDef},
    types::CanonicalType,
};
use serde::Deserialize;

// ─── Raw CSDL serde types ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CsdlRaw {
    /// Solidity event name; defaults to the schema key
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    fingerprint: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    fields: IndexMap<String, CsdlFieldRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CsdlFieldRaw {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    indexed: bool,
    #[serde(default)]
    description: Option<String>,
}

// ─── Parser ───────────────────────────────────────────────────────────────────

pub struct CsdlParser;

impl CsdlParser {
    /// Parse the first descriptor of a CSDL document.
    pub fn parse(yaml: &str) -> Result<EventDescriptor, RegistryError> {
        let mut descriptors = Self::parse_all(yaml)?;
        if descriptors.is_empty() {
            return Err(RegistryError::ParseError("empty CSDL file".into()));
        }
        Ok(descriptors.remove(0))
    }

    /// Parse every `---`-separated document, in file order.
    ///
    /// A declared fingerprint is kept as written; the registry builder checks
    /// it against the signature. A missing one is computed here.
    pub fn parse_all(yaml: &str) -> Result<Vec<EventDescriptor>, RegistryError> {
        let mut descriptors = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(yaml) {
            let value = serde_yaml::Value::deserialize(doc)
                .map_err(|e| RegistryError::ParseError(e.to_string()))?;
            if value.is_null() {
                continue;
            }
            descriptors.push(Self::parse_value(value)?);
        }
        Ok(descriptors)
    }

    fn parse_value(value: serde_yaml::Value) -> Result<EventDescriptor, RegistryError> {
        let serde_yaml::Value::Mapping(mapping) = value else {
            return Err(RegistryError::ParseError(
                "CSDL document must be a YAML mapping".into(),
            ));
        };
        if mapping.len() != 1 {
            return Err(RegistryError::ParseError(
                "CSDL document must hold exactly one 'schema <Kind>' key".into(),
            ));
        }

        let (key, body) = mapping
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::ParseError("missing 'schema <Kind>' key".into()))?;
        let kind = key
            .as_str()
            .and_then(|s| s.strip_prefix("schema "))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RegistryError::ParseError("missing 'schema <Kind>' key".into()))?;

        let raw: CsdlRaw = serde_yaml::from_value(body)
            .map_err(|e| RegistryError::ParseError(format!("schema '{kind}': {e}")))?;

        let mut fields: Vec<(String, FieldDef)> = Vec::with_capacity(raw.fields.len());
        for (name, raw_field) in raw.fields {
            let ty: CanonicalType = raw_field.ty.parse().map_err(|e| {
                RegistryError::ParseError(format!("schema '{kind}', field '{name}': {e}"))
            })?;
            fields.push((
                name,
                FieldDef {
                    ty,
                    indexed: raw_field.indexed,
                    description: raw_field.description,
                },
            ));
        }

        let event = raw.event.unwrap_or_else(|| kind.clone());
        let mut descriptor = EventDescriptor::new(kind, event, fields);
        descriptor.description = raw.description;
        if let Some(declared) = raw.fingerprint {
            descriptor.fingerprint = EventFingerprint::new(declared);
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTER: &str = r#"
schema Register:
  event: Register
  fingerprint: "0xa9d44d6e13bb3fee938c3f66d1103e91f8dc6b12d4405a55eea558e8f275aa6e"
  fields:
    id:     { type: uint256 }
    from:   { type: address, indexed: true }
    amount: { type: uint256 }
"#;

    const MULTI_DOC: &str = r#"
schema Resigned:
  fields:
    from: { type: address }
---
schema OwnershipTransferred:
  event: OwnershipTransferred
  fields:
    previousOwner: { type: address, indexed: true }
    newOwner:      { type: address, indexed: true }
---
"#;

    #[test]
    fn parse_register() {
        let d = CsdlParser::parse(REGISTER).unwrap();
        assert_eq!(d.kind, "Register");
        assert_eq!(d.event, "Register");
        assert_eq!(d.fields.len(), 3);
        assert_eq!(d.signature(), "Register(uint256,address,uint256)");
        assert_eq!(d.fingerprint, d.compute_fingerprint());
    }

    #[test]
    fn field_order_preserved() {
        let d = CsdlParser::parse(REGISTER).unwrap();
        let names: Vec<&str> = d.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["id", "from", "amount"]);
        assert!(d.fields[1].1.indexed);
        assert!(!d.fields[0].1.indexed);
    }

    #[test]
    fn parse_multi_doc_skips_trailing_separator() {
        let ds = CsdlParser::parse_all(MULTI_DOC).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds[0].kind, "Resigned");
        // event name falls back to the schema key
        assert_eq!(ds[0].event, "Resigned");
        assert_eq!(ds[1].indexed_fields().len(), 2);
    }

    #[test]
    fn missing_fingerprint_is_computed() {
        let d = CsdlParser::parse(MULTI_DOC).unwrap();
        assert_eq!(d.fingerprint, d.compute_fingerprint());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let yaml = "schema Bad:\n  fields:\n    x: { type: uint257 }\n";
        let err = CsdlParser::parse(yaml).unwrap_err();
        assert!(matches!(err, RegistryError::ParseError(msg) if msg.contains("'x'")));
    }

    #[test]
    fn missing_schema_key_is_rejected() {
        let err = CsdlParser::parse("event: Foo\n").unwrap_err();
        assert!(matches!(err, RegistryError::ParseError(_)));
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(CsdlParser::parse("---\n").is_err());
    }
}
