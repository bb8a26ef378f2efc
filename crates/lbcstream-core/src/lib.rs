//! # lbcstream-core
//!
//! Shared types for the liquidity-bridge event layer: raw and decoded logs,
//! event descriptors, subscription criteria, the `ValueCodec` seam and the
//! error taxonomy. Every other lbcstream crate builds on these.

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod filter;
pub mod types;

pub use codec::ValueCodec;
pub use descriptor::{keccak256_signature, EventDescriptor, FieldDef};
pub use error::{DecodeError, EncodeError, RegistryError, StreamError, TransportError};
pub use event::{DecodedEvent, EventFingerprint, Provenance, RawLog};
pub use filter::{IndexedPredicate, LogFilter, SubscriptionCriteria};
pub use types::{CanonicalType, NormalizedValue};
