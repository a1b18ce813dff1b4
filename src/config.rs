//! Configuration for a dictionary instance
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

/// Default namespace for keys.
pub const DEFAULT_NAMESPACE: &str = "main";

/// Default number of keys fetched per scan round trip.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Ceiling applied to string keys and values before they are sent (500 MiB).
pub const MAX_STRING_SIZE: usize = 500 * 1024 * 1024;

/// Configuration for a [`VaultDict`](crate::VaultDict) instance.
#[derive(Debug, Clone)]
pub struct DictConfig {
    /// Prefix for all keys stored by this dictionary.
    pub namespace: String,

    /// Expiration applied to new keys. `None` stores keys without a TTL.
    pub expire: Option<Duration>,

    /// Keep the existing TTL when overwriting a key that already exists.
    pub preserve_expiration: bool,

    /// Strict dictionary behavior: deleting an absent key is an error.
    ///
    /// Off by default: in distributed use, another writer may already have
    /// achieved the deletion goal.
    pub raise_on_missing_delete: bool,

    /// Scan round-trip size hint. Not a page-size guarantee.
    pub batch_size: usize,

    /// Byte ceiling for string keys and values.
    pub max_string_size: usize,
}

impl Default for DictConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            expire: None,
            preserve_expiration: false,
            raise_on_missing_delete: false,
            batch_size: DEFAULT_BATCH_SIZE,
            max_string_size: MAX_STRING_SIZE,
        }
    }
}

impl DictConfig {
    /// Create a new config builder
    pub fn builder() -> DictConfigBuilder {
        DictConfigBuilder::default()
    }
}

/// Builder for [`DictConfig`]
#[derive(Default)]
pub struct DictConfigBuilder {
    config: DictConfig,
}

impl DictConfigBuilder {
    /// Set the key namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Set the expiration applied to new keys
    pub fn expire(mut self, expire: Duration) -> Self {
        self.config.expire = Some(expire);
        self
    }

    /// Preserve the TTL of existing keys on overwrite
    pub fn preserve_expiration(mut self, preserve: bool) -> Self {
        self.config.preserve_expiration = preserve;
        self
    }

    /// Error when deleting a key that does not exist
    pub fn raise_on_missing_delete(mut self, strict: bool) -> Self {
        self.config.raise_on_missing_delete = strict;
        self
    }

    /// Set the scan round-trip size hint
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Set the byte ceiling for string keys and values
    pub fn max_string_size(mut self, limit: usize) -> Self {
        self.config.max_string_size = limit;
        self
    }

    pub fn build(self) -> DictConfig {
        self.config
    }
}
