//! The immutable event registry.
//!
//! An `EventRegistry` is assembled once through `EventRegistryBuilder` and
//! is read-only afterwards, so it can be shared as `Arc<EventRegistry>`
//! across every iterator and forwarder without locking.

use std::collections::HashMap;

use lbcstream_core::{
    descriptor::EventDescriptor, error::RegistryError, event::EventFingerprint,
};
use tracing::debug;

use crate::csdl::CsdlParser;

/// Kind → descriptor mapping, with a fingerprint index for topic0 dispatch.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    by_kind: HashMap<String, EventDescriptor>,
    /// fingerprint hex → kind
    by_fingerprint: HashMap<String, String>,
}

impl EventRegistry {
    pub fn builder() -> EventRegistryBuilder {
        EventRegistryBuilder::default()
    }

    /// Descriptor registered under `kind`.
    pub fn lookup(&self, kind: &str) -> Result<&EventDescriptor, RegistryError> {
        self.by_kind
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownEventKind {
                kind: kind.to_string(),
            })
    }

    /// Descriptor whose fingerprint equals `topic0` (case-insensitive).
    pub fn by_fingerprint(&self, topic0: &str) -> Option<&EventDescriptor> {
        let fp = EventFingerprint::new(topic0);
        self.by_fingerprint
            .get(fp.as_hex())
            .and_then(|kind| self.by_kind.get(kind))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.by_kind.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.by_kind.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// All descriptors, sorted by kind.
    pub fn descriptors(&self) -> Vec<&EventDescriptor> {
        let mut all: Vec<&EventDescriptor> = self.by_kind.values().collect();
        all.sort_by(|a, b| a.kind.cmp(&b.kind));
        all
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

/// Collects descriptors, verifying each one, then freezes them.
#[derive(Debug, Default)]
pub struct EventRegistryBuilder {
    inner: EventRegistry,
}

impl EventRegistryBuilder {
    /// Add one descriptor.
    ///
    /// The declared fingerprint must equal keccak256 of the canonical
    /// signature, and neither the kind nor the fingerprint may already be
    /// registered.
    pub fn register(&mut self, descriptor: EventDescriptor) -> Result<&mut Self, RegistryError> {
        let computed = descriptor.compute_fingerprint();
        if computed != descriptor.fingerprint {
            return Err(RegistryError::FingerprintMismatch {
                kind: descriptor.kind,
                declared: descriptor.fingerprint.to_string(),
                computed: computed.to_string(),
            });
        }
        if self.inner.by_kind.contains_key(&descriptor.kind) {
            return Err(RegistryError::AlreadyExists {
                kind: descriptor.kind,
            });
        }
        if let Some(existing) = self.inner.by_fingerprint.get(descriptor.fingerprint.as_hex()) {
            return Err(RegistryError::DuplicateFingerprint {
                fingerprint: descriptor.fingerprint.to_string(),
                kind: existing.clone(),
            });
        }

        debug!(kind = %descriptor.kind, signature = %descriptor.signature(), "registered event descriptor");
        self.inner
            .by_fingerprint
            .insert(descriptor.fingerprint.as_hex().to_string(), descriptor.kind.clone());
        self.inner.by_kind.insert(descriptor.kind.clone(), descriptor);
        Ok(self)
    }

    /// Register every descriptor of a CSDL document. Returns how many were added.
    pub fn load_csdl(&mut self, yaml: &str) -> Result<usize, RegistryError> {
        let descriptors = CsdlParser::parse_all(yaml)?;
        let count = descriptors.len();
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(count)
    }

    /// Register every descriptor of a CSDL file.
    pub fn load_csdl_file(&mut self, path: &std::path::Path) -> Result<usize, RegistryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::ParseError(format!("{}: {e}", path.display())))?;
        self.load_csdl(&content)
    }

    pub fn build(self) -> EventRegistry {
        self.inner
    }
}
