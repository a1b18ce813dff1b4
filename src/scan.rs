//! Lazy, cursor-driven key enumeration
//!
//! Scanning walks the store page by page; keys appearing or vanishing while
//! a scan is in flight may or may not be observed, exactly as the store
//! itself guarantees. The count hint tunes round-trip size, never page size.

use std::collections::VecDeque;

use crate::dict::VaultDict;
use crate::error::Result;
use crate::key::parse_key;
use crate::store::Store;
use crate::value::Value;

/// Iterator over formatted (namespace-prefixed) keys matching a pattern.
pub struct ScanKeys<'a, S: Store> {
    dict: &'a VaultDict<S>,
    pattern: String,
    count: Option<usize>,
    cursor: u64,
    buffer: VecDeque<String>,
    done: bool,
}

impl<'a, S: Store> ScanKeys<'a, S> {
    pub(crate) fn new(dict: &'a VaultDict<S>, pattern: String, count: Option<usize>) -> Self {
        Self {
            dict,
            pattern,
            count,
            cursor: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }
}

impl<'a, S: Store> Iterator for ScanKeys<'a, S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(key) = self.buffer.pop_front() {
                return Some(Ok(key));
            }
            if self.done {
                return None;
            }
            match self.dict.scan_page(self.cursor, &self.pattern, self.count) {
                Ok((cursor, keys)) => {
                    self.cursor = cursor;
                    if cursor == 0 {
                        self.done = true;
                    }
                    self.buffer.extend(keys);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Iterator over user keys in a dictionary.
pub struct Keys<'a, S: Store> {
    scan: ScanKeys<'a, S>,
}

impl<'a, S: Store> Keys<'a, S> {
    pub(crate) fn new(scan: ScanKeys<'a, S>) -> Self {
        Self { scan }
    }
}

impl<'a, S: Store> Iterator for Keys<'a, S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let formatted = self.scan.next()?;
        Some(formatted.map(|key| parse_key(self.scan.dict.namespace(), &key).to_string()))
    }
}

/// Iterator over `(key, value)` pairs.
///
/// Keys are gathered a batch at a time and fetched with one MGET per batch;
/// keys deleted between enumeration and fetch are silently skipped.
pub struct Entries<'a, S: Store> {
    scan: ScanKeys<'a, S>,
    page: VecDeque<(String, Value)>,
    batch: usize,
}

impl<'a, S: Store> Entries<'a, S> {
    pub(crate) fn new(scan: ScanKeys<'a, S>, batch: usize) -> Self {
        Self {
            scan,
            page: VecDeque::new(),
            batch: batch.max(1),
        }
    }
}

impl<'a, S: Store> Iterator for Entries<'a, S> {
    type Item = Result<(String, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pair) = self.page.pop_front() {
                return Some(Ok(pair));
            }
            let mut keys = Vec::with_capacity(self.batch);
            while keys.len() < self.batch {
                match self.scan.next() {
                    Some(Ok(key)) => keys.push(key),
                    Some(Err(e)) => return Some(Err(e)),
                    None => break,
                }
            }
            if keys.is_empty() {
                return None;
            }
            match self.scan.dict.fetch_pairs(&keys) {
                Ok(pairs) => self.page.extend(pairs),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Iterator over values only.
pub struct Values<'a, S: Store> {
    entries: Entries<'a, S>,
}

impl<'a, S: Store> Values<'a, S> {
    pub(crate) fn new(entries: Entries<'a, S>) -> Self {
        Self { entries }
    }
}

impl<'a, S: Store> Iterator for Values<'a, S> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.entries.next()?.map(|(_, value)| value))
    }
}
