//! In-memory key-value store implementation with thread-safe access
//!
//! Provides the [`Store`] interface a dictionary talks to, and a thread-safe
//! in-memory implementation using Arc and RwLock for concurrent access. The
//! in-memory store implements the full command vocabulary, including TTL
//! semantics and cursor-driven scans, so dictionaries can be exercised
//! without a server.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::command::{Command, Reply, SetExpiry};
use crate::error::Result;

/// Trait defining the interface for store command execution.
///
/// Implementations are reached over whatever transport they own; one
/// `execute` call is one round trip, and `execute_batch` sends every queued
/// command in a single round trip.
pub trait Store: Send + Sync {
    /// Execute a single command.
    fn execute(&self, command: Command) -> Result<Reply>;

    /// Execute a batch of commands as one round trip, preserving order.
    fn execute_batch(&self, commands: Vec<Command>) -> Result<Vec<Reply>>;

    /// Whether this store supports cursor-driven key enumeration.
    ///
    /// Scan-backed dictionary operations fail with
    /// [`Unsupported`](crate::VaultDictError::Unsupported) when this is false.
    fn supports_scan(&self) -> bool {
        true
    }
}

/// A stored value with its optional expiration deadline.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Scan page size used when no COUNT hint is given.
const DEFAULT_SCAN_COUNT: usize = 10;

/// Thread-safe in-memory key-value store.
///
/// Cloning produces another handle to the same data, so several
/// dictionaries can share one store the way they would share one server.
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of live (unexpired) keys. Test/debug helper.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data
            .read()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the entry if its deadline has passed. Returns the live value.
    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let data = self.data.read();
            match data.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // expired: upgrade to a write lock and remove
        self.data.write().remove(key);
        None
    }

    fn get(&self, key: &str) -> Reply {
        Reply::Value(self.live_value(key))
    }

    fn set(&self, key: String, value: String, expiry: SetExpiry) -> Reply {
        let now = Instant::now();
        let mut data = self.data.write();
        let expires_at = match expiry {
            SetExpiry::None => None,
            SetExpiry::Seconds(seconds) => Some(now + Duration::from_secs(seconds)),
            SetExpiry::KeepTtl => data
                .get(&key)
                .filter(|entry| !entry.is_expired(now))
                .and_then(|entry| entry.expires_at),
        };
        data.insert(key, Entry { value, expires_at });
        Reply::Ok
    }

    fn set_if_absent(&self, key: String, value: String, expiry: SetExpiry) -> Reply {
        let now = Instant::now();
        let mut data = self.data.write();
        if let Some(entry) = data.get(&key) {
            if !entry.is_expired(now) {
                // the key holds: no write, no TTL change, prior value replied
                return Reply::Value(Some(entry.value.clone()));
            }
        }
        let expires_at = match expiry {
            SetExpiry::None | SetExpiry::KeepTtl => None,
            SetExpiry::Seconds(seconds) => Some(now + Duration::from_secs(seconds)),
        };
        data.insert(key, Entry { value, expires_at });
        Reply::Value(None)
    }

    fn get_del(&self, key: &str) -> Reply {
        let now = Instant::now();
        let mut data = self.data.write();
        match data.remove(key) {
            Some(entry) if !entry.is_expired(now) => Reply::Value(Some(entry.value)),
            _ => Reply::Value(None),
        }
    }

    fn exists(&self, key: &str) -> Reply {
        Reply::Int(i64::from(self.live_value(key).is_some()))
    }

    fn ttl(&self, key: &str) -> Reply {
        let now = Instant::now();
        let data = self.data.read();
        match data.get(key) {
            Some(entry) if !entry.is_expired(now) => match entry.expires_at {
                Some(deadline) => Reply::Int((deadline - now).as_secs() as i64),
                None => Reply::Int(-1),
            },
            _ => Reply::Int(-2),
        }
    }

    fn scan(&self, cursor: u64, pattern: &str, count: Option<usize>) -> Reply {
        let now = Instant::now();
        let page_size = count.unwrap_or(DEFAULT_SCAN_COUNT).max(1);
        let data = self.data.read();
        let matching: Vec<&String> = data
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && glob_match(pattern, key))
            .map(|(key, _)| key)
            .collect();
        let start = cursor as usize;
        let keys: Vec<String> = matching
            .iter()
            .skip(start)
            .take(page_size)
            .map(|key| (*key).clone())
            .collect();
        let consumed = start + keys.len();
        let next_cursor = if consumed >= matching.len() {
            0
        } else {
            consumed as u64
        };
        Reply::Scan {
            cursor: next_cursor,
            keys,
        }
    }

    fn mget(&self, keys: &[String]) -> Reply {
        Reply::Values(keys.iter().map(|key| self.live_value(key)).collect())
    }

    fn del(&self, keys: &[String]) -> Reply {
        let now = Instant::now();
        let mut data = self.data.write();
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = data.remove(key) {
                if !entry.is_expired(now) {
                    removed += 1;
                }
            }
        }
        Reply::Int(removed)
    }
}

impl Store for MemoryStore {
    fn execute(&self, command: Command) -> Result<Reply> {
        let reply = match command {
            Command::Get { key } => self.get(&key),
            Command::Set { key, value, expiry } => self.set(key, value, expiry),
            Command::SetIfAbsent { key, value, expiry } => self.set_if_absent(key, value, expiry),
            Command::GetDel { key } => self.get_del(&key),
            Command::Exists { key } => self.exists(&key),
            Command::Ttl { key } => self.ttl(&key),
            Command::Scan {
                cursor,
                pattern,
                count,
            } => self.scan(cursor, &pattern, count),
            Command::MGet { keys } => self.mget(&keys),
            Command::Del { keys } => self.del(&keys),
        };
        Ok(reply)
    }

    fn execute_batch(&self, commands: Vec<Command>) -> Result<Vec<Reply>> {
        tracing::debug!("executing batch of {} commands", commands.len());
        commands
            .into_iter()
            .map(|command| self.execute(command))
            .collect()
    }
}

/// Match `text` against a store glob pattern (`*`, `?`, `[..]` classes).
///
/// Iterative with backtracking on the most recent `*`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star_pi: Option<usize> = None;
    let mut star_ti = 0;

    while ti < txt.len() || pi < pat.len() {
        if pi < pat.len() {
            match pat[pi] {
                '*' => {
                    star_pi = Some(pi);
                    star_ti = ti;
                    pi += 1;
                    continue;
                }
                '?' if ti < txt.len() => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                '[' if ti < txt.len() => {
                    if let Some((matched, class_end)) = match_class(&pat, pi, txt[ti]) {
                        if matched {
                            pi = class_end + 1;
                            ti += 1;
                            continue;
                        }
                    }
                }
                c if ti < txt.len() && c == txt[ti] => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                _ => {}
            }
        }
        // mismatch: retry from the last star, consuming one more char
        match star_pi {
            Some(star) if star_ti < txt.len() => {
                star_ti += 1;
                ti = star_ti;
                pi = star + 1;
            }
            _ => return false,
        }
    }
    true
}

/// Match one character against a `[..]` class starting at `pat[open]`.
/// Returns (matched, index of the closing bracket), or None if unterminated.
fn match_class(pat: &[char], open: usize, c: char) -> Option<(bool, usize)> {
    let mut j = open + 1;
    let negated = pat.get(j) == Some(&'^');
    if negated {
        j += 1;
    }
    let mut matched = false;
    let mut first = true;
    while j < pat.len() && (first || pat[j] != ']') {
        if pat[j + 1..].first() == Some(&'-') && j + 2 < pat.len() && pat[j + 2] != ']' {
            if pat[j] <= c && c <= pat[j + 2] {
                matched = true;
            }
            j += 3;
        } else {
            if pat[j] == c {
                matched = true;
            }
            j += 1;
        }
        first = false;
    }
    if j >= pat.len() {
        return None;
    }
    Some((matched != negated, j))
}
