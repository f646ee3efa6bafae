//! In-memory key-value backend.

use std::collections::BTreeMap;

use bytes::Bytes;
use modstore_core_store::{Error, Key, Reader, Record, Writer};

/// An in-memory backend holding one record per key.
///
/// Records are kept exactly as written: parsed values stay parsed, raw bytes
/// stay raw (and are only decoded by whoever reads them).
///
/// # Example
///
/// ```rust
/// use modstore_json_store::InMemoryStore;
/// use modstore_core_store::{key, Reader, Record, Value, Writer};
///
/// let mut store = InMemoryStore::new();
///
/// store.write(&key!("name"), Record::parsed(Value::from("Alice"))).unwrap();
///
/// let record = store.read(&key!("name")).unwrap().unwrap();
/// assert_eq!(record.as_value(), Some(&Value::from("Alice")));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: BTreeMap<Key, Record>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw JSON bytes under a key without validating them.
    pub fn write_raw(&mut self, key: &Key, bytes: impl Into<Bytes>) {
        self.records.insert(key.clone(), Record::raw(bytes));
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.records.contains_key(key)
    }

    /// Remove a record, returning it if it existed.
    pub fn remove(&mut self, key: &Key) -> Option<Record> {
        self.records.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Reader for InMemoryStore {
    fn read(&mut self, from: &Key) -> Result<Option<Record>, Error> {
        Ok(self.records.get(from).cloned())
    }
}

impl Writer for InMemoryStore {
    fn write(&mut self, to: &Key, data: Record) -> Result<Key, Error> {
        self.records.insert(to.clone(), data);
        Ok(to.clone())
    }
}
