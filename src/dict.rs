//! Dictionary facade over a remote key-value store
//!
//! [`VaultDict`] composes the key codec, type registry, command construction,
//! pipelining scope, and scan enumeration into mapping-style operations.
//! Every operation is one synchronous round trip against the backing store
//! (or a queued unit inside a pipeline scope); ordering guarantees are the
//! store's own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::command::{Command, Reply, SetExpiry};
use crate::config::DictConfig;
use crate::envelope::Envelope;
use crate::error::{Result, VaultDictError};
use crate::key::{format_key, parse_key, scan_pattern};
use crate::registry::{DecodeFn, EncodeFn, Extended, SharedRegistry, TypeRegistry};
use crate::scan::{Entries, Keys, ScanKeys, Values};
use crate::store::{MemoryStore, Store};
use crate::value::Value;

/// Depth-counted write queue. Armed at the first scope entry, drained
/// exactly once when the outermost scope exits.
struct PipelineState {
    depth: usize,
    queue: Vec<Command>,
}

/// Dictionary-style view of a namespaced slice of a key-value store.
///
/// Writes honor the configured TTL policy; reads decode wire envelopes back
/// into [`Value`]s through the instance's type registry. Cloned store handles
/// let several dictionaries (possibly with different configurations) share
/// one backend, the way separate processes share one server.
pub struct VaultDict<S: Store = MemoryStore> {
    store: S,
    config: DictConfig,
    registry: SharedRegistry,
    pipeline: PipelineState,
}

impl VaultDict<MemoryStore> {
    /// A dictionary over a fresh in-memory store. Mostly useful for tests
    /// and embedded use.
    pub fn in_memory(config: DictConfig) -> Self {
        Self::new(MemoryStore::new(), config)
    }
}

impl<S: Store> VaultDict<S> {
    /// Create a dictionary over `store` with its own type registry.
    pub fn new(store: S, config: DictConfig) -> Self {
        Self::with_registry(store, config, Arc::new(RwLock::new(TypeRegistry::new())))
    }

    /// Create a dictionary sharing an existing registry handle, e.g.
    /// [`TypeRegistry::shared`] or another dictionary's
    /// [`registry`](Self::registry).
    pub fn with_registry(store: S, config: DictConfig, registry: SharedRegistry) -> Self {
        Self {
            store,
            config,
            registry,
            pipeline: PipelineState {
                depth: 0,
                queue: Vec::new(),
            },
        }
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn config(&self) -> &DictConfig {
        &self.config
    }

    pub fn expire(&self) -> Option<Duration> {
        self.config.expire
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handle to this dictionary's type registry.
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    // -------------------------------------------------------------------
    // single-key operations
    // -------------------------------------------------------------------

    /// Look up a key. Absence is `Ok(None)`, never an error.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let command = Command::Get {
            key: format_key(self.namespace(), key),
        };
        match self.read(command)? {
            Reply::Value(Some(wire)) => Ok(Some(self.open_wire(&wire)?)),
            Reply::Value(None) => Ok(None),
            other => Err(unexpected_reply("GET", &other)),
        }
    }

    /// Look up a key that must exist.
    pub fn fetch(&self, key: &str) -> Result<Value> {
        self.get(key)?
            .ok_or_else(|| VaultDictError::KeyNotFound(key.to_string()))
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let command = Command::Exists {
            key: format_key(self.namespace(), key),
        };
        match self.read(command)? {
            Reply::Int(n) => Ok(n > 0),
            other => Err(unexpected_reply("EXISTS", &other)),
        }
    }

    /// Store a value under a key.
    ///
    /// Size limits are checked before anything is sent; with
    /// `preserve_expiration` an existing key keeps its TTL, otherwise the
    /// configured expiry (if any) is applied.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.validate(key, &value)?;

        let formatted = format_key(self.namespace(), key);
        let wire = self.seal(&value)?;
        let exists = if self.config.preserve_expiration {
            // direct probe even inside a pipeline scope: the policy decision
            // must reflect the store as it is now
            self.key_exists(&formatted)?
        } else {
            false
        };
        let expiry = SetExpiry::for_write(
            self.config.expire,
            self.config.preserve_expiration,
            exists,
        );
        self.issue_write(Command::Set {
            key: formatted,
            value: wire,
            expiry,
        })?;
        Ok(())
    }

    /// Delete a key.
    ///
    /// Idempotent by default: deleting an absent key is a no-op, so code
    /// running on several systems does not fail when another writer already
    /// removed the key. With `raise_on_missing_delete` the absence is a
    /// [`KeyNotFound`](VaultDictError::KeyNotFound) error; inside a pipeline
    /// scope the deleted count is unknown until flush and the strict check
    /// does not apply.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let formatted = format_key(self.namespace(), key);
        match self.issue_write(Command::Del {
            keys: vec![formatted],
        })? {
            Some(Reply::Int(0)) if self.config.raise_on_missing_delete => {
                Err(VaultDictError::KeyNotFound(key.to_string()))
            }
            Some(Reply::Int(_)) | None => Ok(()),
            Some(other) => Err(unexpected_reply("DEL", &other)),
        }
    }

    /// Atomically remove a key and return its value.
    pub fn pop(&mut self, key: &str) -> Result<Value> {
        match self.take(key)? {
            Some(value) => Ok(value),
            None => Err(VaultDictError::KeyNotFound(key.to_string())),
        }
    }

    /// Atomically remove a key and return its value, or `default` when the
    /// key is absent.
    pub fn pop_or(&mut self, key: &str, default: impl Into<Value>) -> Result<Value> {
        match self.take(key)? {
            Some(value) => Ok(value),
            None => Ok(default.into()),
        }
    }

    fn take(&mut self, key: &str) -> Result<Option<Value>> {
        let command = Command::GetDel {
            key: format_key(self.namespace(), key),
        };
        match self.read(command)? {
            Reply::Value(Some(wire)) => Ok(Some(self.open_wire(&wire)?)),
            Reply::Value(None) => Ok(None),
            other => Err(unexpected_reply("GETDEL", &other)),
        }
    }

    /// Store `default` only if the key is absent and return the key's value.
    ///
    /// A single conditional command resolves racing callers: the loser's
    /// return value is the winner's stored value, and the winner's TTL is
    /// left untouched. The TTL decision follows this caller's own policy.
    pub fn setdefault(&mut self, key: &str, default: impl Into<Value>) -> Result<Value> {
        let default = default.into();
        let command = Command::SetIfAbsent {
            key: format_key(self.namespace(), key),
            value: self.seal(&default)?,
            expiry: SetExpiry::for_set_if_absent(
                self.config.expire,
                self.config.preserve_expiration,
            ),
        };
        match self.read(command)? {
            Reply::Value(Some(prior)) => self.open_wire(&prior),
            Reply::Value(None) => Ok(default),
            other => Err(unexpected_reply("SET NX GET", &other)),
        }
    }

    /// Remove and return an arbitrary `(key, value)` pair.
    ///
    /// Selection and removal are separate commands; when another writer
    /// takes the selected key first, a new key is selected. The dictionary
    /// is empty only when selection itself finds nothing.
    pub fn popitem(&mut self) -> Result<(String, Value)> {
        loop {
            let key = match self.first_key("")? {
                Some(key) => key,
                None => return Err(VaultDictError::Empty),
            };
            match self.pop(&key) {
                Ok(value) => return Ok((key, value)),
                Err(VaultDictError::KeyNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Remaining time to live of a key, if it has one.
    pub fn get_ttl(&self, key: &str) -> Result<Option<u64>> {
        let command = Command::Ttl {
            key: format_key(self.namespace(), key),
        };
        match self.read(command)? {
            Reply::Int(ttl) if ttl < 0 => Ok(None),
            Reply::Int(ttl) => Ok(Some(ttl as u64)),
            other => Err(unexpected_reply("TTL", &other)),
        }
    }

    // -------------------------------------------------------------------
    // enumeration
    // -------------------------------------------------------------------

    /// Number of keys in the namespace. A full scan: O(n), never cached.
    pub fn len(&self) -> Result<usize> {
        let mut count = 0;
        for key in self.scan_keys("", true) {
            key?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.first_key("")?.is_none())
    }

    /// Iterate over user keys.
    pub fn keys(&self) -> Keys<'_, S> {
        Keys::new(self.scan_keys("", false))
    }

    /// Iterate over `(key, value)` pairs. Keys removed mid-iteration are
    /// skipped.
    pub fn entries(&self) -> Entries<'_, S> {
        Entries::new(self.scan_keys("", false), self.config.batch_size)
    }

    /// Iterate over values.
    pub fn values(&self) -> Values<'_, S> {
        Values::new(self.entries())
    }

    /// Materialize the whole namespace as a map.
    pub fn to_map(&self) -> Result<HashMap<String, Value>> {
        self.entries().collect()
    }

    /// First key matching `search_term`, if any.
    pub fn first_key(&self, search_term: &str) -> Result<Option<String>> {
        let pattern = scan_pattern(self.namespace(), search_term);
        let mut cursor = 0;
        loop {
            let (next, keys) = self.scan_page(cursor, &pattern, Some(1))?;
            if let Some(key) = keys.into_iter().next() {
                return Ok(Some(parse_key(self.namespace(), &key).to_string()));
            }
            if next == 0 {
                return Ok(None);
            }
            cursor = next;
        }
    }

    /// Remove every key in the namespace, batched into one round trip.
    pub fn clear(&mut self) -> Result<()> {
        let keys: Vec<String> = self.scan_keys("", true).collect::<Result<_>>()?;
        tracing::debug!("clearing {} keys", keys.len());
        self.pipelined(move |dict| {
            for key in keys {
                dict.issue_write(Command::Del { keys: vec![key] })?;
            }
            Ok(())
        })
    }

    // -------------------------------------------------------------------
    // bulk operations
    // -------------------------------------------------------------------

    /// Store every pair, batched into one round trip.
    pub fn update<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.pipelined(move |dict| {
            for (key, value) in pairs {
                let key = key.into();
                dict.set(&key, value)?;
            }
            Ok(())
        })
    }

    /// Store the same value under every key.
    pub fn from_keys<I, K>(&mut self, keys: I, value: impl Into<Value>) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let value = value.into();
        for key in keys {
            let key = key.into();
            self.set(&key, value.clone())?;
        }
        Ok(())
    }

    /// Merge this dictionary's contents with another map into a new map.
    /// Pairs from `other` win on key collisions.
    pub fn union(&self, other: &HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        let mut merged = self.to_map()?;
        for (key, value) in other {
            merged.insert(key.clone(), value.clone());
        }
        Ok(merged)
    }

    /// All values under keys starting with `prefix`.
    pub fn multi_get(&self, prefix: &str) -> Result<Vec<Value>> {
        let keys: Vec<String> = self.scan_keys(prefix, false).collect::<Result<_>>()?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        match self.read(Command::MGet { keys })? {
            Reply::Values(values) => values
                .into_iter()
                .flatten()
                .map(|wire| self.open_wire(&wire))
                .collect(),
            other => Err(unexpected_reply("MGET", &other)),
        }
    }

    /// Map of key suffix to value for keys starting with `prefix`.
    ///
    /// Result keys have the namespace and the search prefix stripped:
    /// with keys `foobar` and `foobaz`, `multi_dict("foo")` yields
    /// `{"bar": .., "baz": ..}`.
    pub fn multi_dict(&self, prefix: &str) -> Result<HashMap<String, Value>> {
        let keys: Vec<String> = self.scan_keys(prefix, false).collect::<Result<_>>()?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let trim = self.namespace().len() + 1 + prefix.len();
        let values = match self.read(Command::MGet { keys: keys.clone() })? {
            Reply::Values(values) => values,
            other => return Err(unexpected_reply("MGET", &other)),
        };
        let mut map = HashMap::new();
        for (key, wire) in keys.iter().zip(values) {
            if let Some(wire) = wire {
                // glob metacharacters in the prefix can match keys shorter
                // than the pattern itself; fall back to the whole suffix
                let suffix = key.get(trim..).unwrap_or(parse_key(self.namespace(), key));
                map.insert(suffix.to_string(), self.open_wire(&wire)?);
            }
        }
        Ok(map)
    }

    /// Delete every key starting with `prefix`; returns the number removed
    /// (0 while queued inside a pipeline scope).
    pub fn multi_del(&mut self, prefix: &str) -> Result<usize> {
        let keys: Vec<String> = self.scan_keys(prefix, false).collect::<Result<_>>()?;
        if keys.is_empty() {
            return Ok(0);
        }
        match self.issue_write(Command::Del { keys })? {
            Some(Reply::Int(removed)) => Ok(removed as usize),
            None => Ok(0),
            Some(other) => Err(unexpected_reply("DEL", &other)),
        }
    }

    // -------------------------------------------------------------------
    // chained keys
    // -------------------------------------------------------------------

    /// Store a value under a `:`-joined key path.
    pub fn chain_set(&mut self, path: &[&str], value: impl Into<Value>) -> Result<()> {
        self.set(&path.join(":"), value)
    }

    /// Look up a `:`-joined key path that must exist.
    pub fn chain_get(&self, path: &[&str]) -> Result<Value> {
        self.fetch(&path.join(":"))
    }

    /// Delete a `:`-joined key path.
    pub fn chain_del(&mut self, path: &[&str]) -> Result<()> {
        self.delete(&path.join(":"))
    }

    /// All values under keys starting with a `:`-joined path.
    pub fn multi_chain_get(&self, path: &[&str]) -> Result<Vec<Value>> {
        self.multi_get(&path.join(":"))
    }

    // -------------------------------------------------------------------
    // scopes
    // -------------------------------------------------------------------

    /// Run `body` with writes queued, flushing them as one round trip when
    /// the outermost scope exits.
    ///
    /// Scopes nest: only the exit that returns the depth to zero flushes.
    /// The flush is unconditional: commands queued before an error in the
    /// body are still sent, and a flush error supersedes the body's. Reads
    /// inside the scope go to the store directly and do not observe queued
    /// writes. Batching buys round trips, not transactional rollback.
    pub fn pipelined<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.pipeline.depth += 1;
        let result = body(self);
        self.pipeline.depth -= 1;
        if self.pipeline.depth == 0 && !self.pipeline.queue.is_empty() {
            let queued = std::mem::take(&mut self.pipeline.queue);
            tracing::debug!("flushing {} queued commands", queued.len());
            self.store.execute_batch(queued)?;
        }
        result
    }

    /// Run `body` with the expiration configuration replaced, restoring the
    /// prior value on exit, error included.
    pub fn with_expire<T, F>(&mut self, expire: Duration, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let prior = self.config.expire.replace(expire);
        let result = body(self);
        self.config.expire = prior;
        result
    }

    // -------------------------------------------------------------------
    // type extension
    // -------------------------------------------------------------------

    /// Register a custom type with this dictionary's registry.
    pub fn extend_type<T: Extended + 'static>(&self) {
        self.registry.write().register::<T>();
    }

    /// Register explicit encode/decode functions for a tag. Either side may
    /// be omitted; supplying neither is an error.
    pub fn extend_with(
        &self,
        tag: impl Into<String>,
        encode: Option<EncodeFn>,
        decode: Option<DecodeFn>,
    ) -> Result<()> {
        self.registry.write().extend_with(tag, encode, decode)
    }

    // -------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------

    fn validate(&self, key: &str, value: &Value) -> Result<()> {
        let limit = self.config.max_string_size;
        if key.len() > limit {
            return Err(VaultDictError::SizeExceeded {
                kind: "key",
                size: key.len(),
                limit,
            });
        }
        if let Value::Str(s) = value {
            if s.len() > limit {
                return Err(VaultDictError::SizeExceeded {
                    kind: "value",
                    size: s.len(),
                    limit,
                });
            }
        }
        Ok(())
    }

    fn seal(&self, value: &Value) -> Result<String> {
        Ok(Envelope::seal(&self.registry.read(), value)?.to_wire())
    }

    fn open_wire(&self, wire: &str) -> Result<Value> {
        Envelope::open(&self.registry.read(), wire)
    }

    /// Reads always bypass the pipeline queue.
    fn read(&self, command: Command) -> Result<Reply> {
        self.store.execute(command)
    }

    /// Route a write through the pipeline queue when one is armed.
    fn issue_write(&mut self, command: Command) -> Result<Option<Reply>> {
        debug_assert!(command.is_write(), "only plain writes may be queued");
        if self.pipeline.depth > 0 {
            tracing::trace!("queueing {:?}", command);
            self.pipeline.queue.push(command);
            Ok(None)
        } else {
            self.store.execute(command).map(Some)
        }
    }

    fn key_exists(&self, formatted_key: &str) -> Result<bool> {
        match self.read(Command::Exists {
            key: formatted_key.to_string(),
        })? {
            Reply::Int(n) => Ok(n > 0),
            other => Err(unexpected_reply("EXISTS", &other)),
        }
    }

    pub(crate) fn scan_keys(&self, search_term: &str, full_scan: bool) -> ScanKeys<'_, S> {
        let pattern = scan_pattern(self.namespace(), search_term);
        let count = if full_scan {
            None
        } else {
            Some(self.config.batch_size)
        };
        ScanKeys::new(self, pattern, count)
    }

    pub(crate) fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> Result<(u64, Vec<String>)> {
        if !self.store.supports_scan() {
            return Err(VaultDictError::Unsupported("prefix key scanning"));
        }
        match self.read(Command::Scan {
            cursor,
            pattern: pattern.to_string(),
            count,
        })? {
            Reply::Scan { cursor, keys } => Ok((cursor, keys)),
            other => Err(unexpected_reply("SCAN", &other)),
        }
    }

    pub(crate) fn fetch_pairs(&self, formatted_keys: &[String]) -> Result<Vec<(String, Value)>> {
        let values = match self.read(Command::MGet {
            keys: formatted_keys.to_vec(),
        })? {
            Reply::Values(values) => values,
            other => return Err(unexpected_reply("MGET", &other)),
        };
        let mut pairs = Vec::with_capacity(values.len());
        for (key, wire) in formatted_keys.iter().zip(values) {
            if let Some(wire) = wire {
                pairs.push((
                    parse_key(self.namespace(), key).to_string(),
                    self.open_wire(&wire)?,
                ));
            }
        }
        Ok(pairs)
    }
}

fn unexpected_reply(command: &str, reply: &Reply) -> VaultDictError {
    VaultDictError::Protocol(format!("unexpected reply to {}: {:?}", command, reply))
}
