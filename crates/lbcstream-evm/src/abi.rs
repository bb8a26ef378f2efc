//! Event descriptors from a standard Ethereum ABI JSON document.
//!
//! Accepts either a bare ABI array or a compiler artifact object with an
//! `"abi"` key. Anonymous events are skipped since they carry no topic0.

use alloy_json_abi::JsonAbi;
use lbcstream_core::{
    descriptor::{EventDescriptor, FieldDef},
    error::RegistryError,
    types::CanonicalType,
};

/// Build one descriptor per non-anonymous event, sorted by event name.
///
/// Unnamed parameters are called `arg0`, `arg1`, … by position.
pub fn descriptors_from_abi_json(json: &str) -> Result<Vec<EventDescriptor>, RegistryError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| RegistryError::ParseError(format!("ABI JSON: {e}")))?;
    let value = match value {
        serde_json::Value::Object(mut artifact) => artifact
            .remove("abi")
            .ok_or_else(|| RegistryError::ParseError("ABI JSON object has no 'abi' key".into()))?,
        other => other,
    };
    let abi: JsonAbi =
        serde_json::from_value(value).map_err(|e| RegistryError::ParseError(format!("ABI JSON: {e}")))?;

    let mut descriptors = Vec::new();
    for event in abi.events().filter(|e| !e.anonymous) {
        let mut fields = Vec::with_capacity(event.inputs.len());
        for (i, param) in event.inputs.iter().enumerate() {
            let selector_type = param.selector_type();
            let ty: CanonicalType = selector_type.parse().map_err(|e| {
                RegistryError::ParseError(format!("event '{}', param {i}: {e}", event.name))
            })?;
            let name = if param.name.is_empty() {
                format!("arg{i}")
            } else {
                param.name.clone()
            };
            fields.push((
                name,
                FieldDef {
                    ty,
                    indexed: param.indexed,
                    description: None,
                },
            ));
        }
        descriptors.push(EventDescriptor::new(event.name.clone(), event.name.clone(), fields));
    }
    Ok(descriptors)
}
