//! # lbcstream-evm
//!
//! EVM implementation of the `ValueCodec` seam.
//!
//! ## Implementation notes
//! - Uses `alloy-core` dynamic ABI for decode and topic encoding
//! - topics[0] → event fingerprint, checked against the descriptor
//! - topics[1..] → indexed parameters (each one 32-byte word)
//! - `data` → non-indexed parameters (ABI-encoded parameter tuple)

pub mod abi;
pub mod decoder;
pub mod fingerprint;
pub mod normalizer;

pub use abi::descriptors_from_abi_json;
pub use decoder::EvmCodec;
