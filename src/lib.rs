//! vaultdict - A typed, dictionary-style client layer for a Valkey-compatible key-value store
//!
//! This library presents a remote, namespaced key-value store as a mutable
//! associative container with:
//! - Type-tagged value envelopes with a pluggable encode/decode registry
//! - TTL policy (fixed expiry, preserve-on-update, scoped override) expressed
//!   through the store's atomic write primitives
//! - Reentrant pipelining that coalesces writes into one round trip
//! - Cursor-driven scans backing iteration, length, and prefix operations
//!
//! The store itself is an external collaborator reached through the
//! [`Store`] trait; [`MemoryStore`] implements the full command vocabulary
//! in-process.

pub mod command;
pub mod config;
pub mod dict;
pub mod envelope;
pub mod error;
pub mod key;
pub mod registry;
pub mod scan;
pub mod store;
pub mod value;

pub use command::{Command, Reply, SetExpiry};
pub use config::DictConfig;
pub use dict::VaultDict;
pub use envelope::Envelope;
pub use error::{Result, VaultDictError};
pub use registry::{DecodeFn, EncodeFn, Extended, SharedRegistry, TypeRegistry};
pub use scan::{Entries, Keys, Values};
pub use store::{MemoryStore, Store};
pub use value::Value;
