//! Error types for vaultdict

use thiserror::Error;

/// Result type alias for vaultdict operations
pub type Result<T> = std::result::Result<T, VaultDictError>;

/// Custom error types for vaultdict
#[derive(Error, Debug)]
pub enum VaultDictError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("popitem(): dictionary is empty")]
    Empty,

    #[error("{kind} of {size} bytes exceeds the maximum of {limit} bytes")]
    SizeExceeded {
        kind: &'static str,
        size: usize,
        limit: usize,
    },

    #[error("no encoder or decoder supplied for type tag '{0}'")]
    MissingCodec(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),

    #[error("malformed envelope: {0}")]
    Envelope(String),

    #[error("failed to decode tag '{tag}': {reason}")]
    Decode { tag: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("store error: {0}")]
    Store(String),
}
