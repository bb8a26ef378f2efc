//! # lbcstream-registry
//!
//! Event descriptors for the liquidity-bridge contract: the CSDL loader,
//! the immutable `EventRegistry`, and the embedded contract catalogue.

pub mod csdl;
pub mod lbc;
pub mod registry;

pub use csdl::CsdlParser;
pub use lbc::{lbc_registry, LbcEventKind, LBC_CSDL};
pub use registry::{EventRegistry, EventRegistryBuilder};
