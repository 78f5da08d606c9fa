use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use super::{LocalStore, Record, StoreError, Versioned};

/// In-memory `LocalStore`. Per-key atomicity comes from `DashMap` shard locks.
pub struct MemoryStore {
    rows: DashMap<String, Versioned>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Builds a store that already holds `records`, as a restarted node would.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Arc<Self> {
        let store = Self::default();
        for record in records {
            store.rows.insert(record.key.clone(), record.versioned());
        }
        Arc::new(store)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl LocalStore for MemoryStore {
    fn put(&self, record: Record) -> Result<(), StoreError> {
        self.rows.insert(record.key.clone(), record.versioned());
        tracing::debug!("Inserted: {} -> {:?}", record.key, record.value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        Ok(self
            .rows
            .get(key)
            .map(|row| Record::new(key, row.value().value.clone(), row.value().version)))
    }

    fn version(&self, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.rows.get(key).map(|row| row.value().version))
    }

    fn scan_all(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .rows
            .iter()
            .map(|entry| {
                let row = entry.value();
                Record::new(entry.key().clone(), row.value.clone(), row.version)
            })
            .collect())
    }

    fn delete_key(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self.rows.remove(key).map_or(0, |_| 1))
    }

    fn drop_all(&self) -> Result<usize, StoreError> {
        let count = self.rows.len();
        self.rows.clear();
        Ok(count)
    }

    fn count_all(&self) -> Result<usize, StoreError> {
        Ok(self.rows.len())
    }

    fn put_next_version(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let mut row = self.rows.entry(key.to_string()).or_insert(Versioned {
            value: String::new(),
            version: 0,
        });
        let slot = row.value_mut();
        slot.version += 1;
        slot.value = value.to_string();
        Ok(slot.version)
    }

    fn merge(&self, record: Record) -> Result<bool, StoreError> {
        match self.rows.entry(record.key.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().version > record.version {
                    tracing::debug!(
                        "Kept {} at version {} over incoming version {}",
                        record.key,
                        existing.get().version,
                        record.version
                    );
                    return Ok(false);
                }
                existing.insert(record.versioned());
            }
            Entry::Vacant(slot) => {
                slot.insert(record.versioned());
            }
        }
        Ok(true)
    }
}
