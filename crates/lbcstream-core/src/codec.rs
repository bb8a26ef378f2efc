//! The `ValueCodec` trait, the seam between the streaming layer and a
//! concrete ABI implementation.
//!
//! Implementations must be `Send + Sync` so one codec can be shared by every
//! iterator and forwarder task as `Arc<dyn ValueCodec>`.

use crate::descriptor::{EventDescriptor, FieldDef};
use crate::error::{DecodeError, EncodeError};
use crate::event::{DecodedEvent, RawLog};
use crate::types::NormalizedValue;

pub trait ValueCodec: Send + Sync {
    /// Decode one raw log against `descriptor`.
    ///
    /// Must be pure: the same inputs always give the same output, and the
    /// result carries the raw log's provenance unchanged.
    fn decode_log(
        &self,
        descriptor: &EventDescriptor,
        raw: &RawLog,
    ) -> Result<DecodedEvent, DecodeError>;

    /// Encode a predicate value into the 32-byte topic word an indexed field
    /// of type `field.ty` would carry.
    fn encode_topic(&self, field: &FieldDef, value: &NormalizedValue) -> Result<String, EncodeError>;
}
