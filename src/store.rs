// 9.0 store.rs: byte-keyed state store behind a trait. the engine never touches globals.
// records are serde_json encoded. key layout is {pair}/{kind}[/{counter|trader}].

use crate::types::{TokenPair, TraderAddr};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("failed to encode record for key {key}: {reason}")]
    Encode { key: String, reason: String },

    #[error("failed to decode record at key {key}: {reason}")]
    Decode { key: String, reason: String },
}

pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);
    fn delete(&mut self, key: &[u8]);

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    fn get_record<T: DeserializeOwned>(&self, key: &StoreKey) -> Result<Option<T>, StoreError>
    where
        Self: Sized,
    {
        match self.get(key.as_bytes()) {
            None => Ok(None),
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| StoreError::Decode {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    fn set_record<T: Serialize>(&mut self, key: &StoreKey, value: &T) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        let raw = encode(key, value)?;
        self.set(key.as_bytes().to_vec(), raw);
        Ok(())
    }
}

pub fn encode<T: Serialize>(key: &StoreKey, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Encode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/** 9.1: typed keys. counters are zero-padded so byte order is numeric order */
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn pool(pair: &TokenPair) -> Self {
        Self(format!("{pair}/pool"))
    }

    pub fn snapshot(pair: &TokenPair, counter: u64) -> Self {
        Self(format!("{pair}/snapshot/{counter:020}"))
    }

    pub fn snapshot_counter(pair: &TokenPair) -> Self {
        Self(format!("{pair}/snapshot_counter"))
    }

    pub fn position(pair: &TokenPair, trader: &TraderAddr) -> Self {
        Self(format!("{pair}/position/{trader}"))
    }

    pub fn pair_metadata(pair: &TokenPair) -> Self {
        Self(format!("{pair}/pair_metadata"))
    }

    pub fn premium_fraction(pair: &TokenPair, index: u64) -> Self {
        Self(format!("{pair}/premium_fraction/{index:020}"))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// 9.2: ordered in-memory store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.keys().map(|k| k.as_slice())
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }
}

/** 9.3: write buffer over a parent. reads fall through, nothing reaches the parent until commit */
#[derive(Debug)]
pub struct CacheStore<'a, S: KvStore> {
    parent: &'a S,
    // None marks a pending delete
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: KvStore> CacheStore<'a, S> {
    pub fn new(parent: &'a S) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    pub fn into_writes(self) -> BTreeMap<Vec<u8>, Option<Vec<u8>>> {
        self.writes
    }
}

impl<S: KvStore> KvStore for CacheStore<'_, S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(pending) => pending.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }
}

pub fn apply_writes<S: KvStore>(store: &mut S, writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>) {
    for (key, value) in writes {
        match value {
            Some(value) => store.set(key, value),
            None => store.delete(&key),
        }
    }
}
