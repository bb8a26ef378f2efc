//! Error types for the event layer.

use thiserror::Error;

/// A raw log did not match its declared schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Log has no topics")]
    MissingSignature,

    #[error("Event signature mismatch: expected {expected}, got {got}")]
    SignatureMismatch { expected: String, got: String },

    #[error("No registered event kind for fingerprint {fingerprint}")]
    UnexpectedEvent { fingerprint: String },

    #[error("Missing indexed topic for field '{field}'")]
    MissingTopic { field: String },

    #[error("Invalid topic for field '{field}': {reason}")]
    InvalidTopic { field: String, reason: String },

    #[error("ABI decode failed: {reason}")]
    AbiDecodeFailed { reason: String },

    #[error("Unsupported type {ty} for field '{field}'")]
    UnsupportedType { field: String, ty: String },
}

/// A predicate value could not be encoded as a topic word.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Value {value} does not fit type {ty}")]
    TypeMismatch { ty: String, value: String },

    #[error("Invalid value: {reason}")]
    InvalidValue { reason: String },
}

/// Errors from building or querying the event registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Unknown event kind '{kind}'")]
    UnknownEventKind { kind: String },

    #[error("Event kind '{kind}' already registered")]
    AlreadyExists { kind: String },

    #[error("Fingerprint {fingerprint} already registered by '{kind}'")]
    DuplicateFingerprint { fingerprint: String, kind: String },

    #[error("Fingerprint mismatch for '{kind}': declared {declared}, computed {computed}")]
    FingerprintMismatch {
        kind: String,
        declared: String,
        computed: String,
    },

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Failures reported by a `LogTransport`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("RPC connection failed: {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Subscription failed: {0}")]
    Subscription(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Connection closed unexpectedly")]
    Closed,
}

/// Terminal errors surfaced by historical iterators and live forwarders.
///
/// Cancellation is not represented: a cancelled consumer ends with `Ok`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Unknown event kind '{kind}'")]
    UnknownEventKind { kind: String },

    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Forwarder task failed: {0}")]
    Task(String),
}

impl StreamError {
    /// Transport failures may be transient; the caller owns any retry policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, StreamError::Transport(_))
    }
}

impl From<RegistryError> for StreamError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownEventKind { kind } => StreamError::UnknownEventKind { kind },
            other => StreamError::InvalidCriteria(other.to_string()),
        }
    }
}

impl From<EncodeError> for StreamError {
    fn from(e: EncodeError) -> Self {
        StreamError::InvalidCriteria(e.to_string())
    }
}
