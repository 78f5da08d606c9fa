//! Local Storage Module
//!
//! Holds this node's share of the keyspace: its own partition plus the
//! replicas it keeps for neighbouring coordinators.
//!
//! ## Core Concepts
//! - **Record**: `(key, value, version)`. The version is the only conflict
//!   resolution signal; higher wins.
//! - **LocalStore**: the contract the replication engine writes through. All
//!   calls are internally synchronized, so concurrent handlers need no
//!   caller-side locking.
//! - **MemoryStore**: the `DashMap`-backed implementation used by nodes and tests.

pub mod memory;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A value together with the version it was written at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Versioned {
    pub value: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub value: String,
    pub version: u64,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>, version: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            version,
        }
    }

    pub fn versioned(&self) -> Versioned {
        Versioned {
            value: self.value.clone(),
            version: self.version,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation '{operation}' failed: {message}")]
    Operation { operation: String, message: String },
}

/// Durable key-value rows for one node.
pub trait LocalStore: Send + Sync {
    /// Upsert, replacing any existing row for the key.
    fn put(&self, record: Record) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<Record>, StoreError>;

    fn version(&self, key: &str) -> Result<Option<u64>, StoreError>;

    fn scan_all(&self) -> Result<Vec<Record>, StoreError>;

    /// Returns the number of rows removed (0 or 1).
    fn delete_key(&self, key: &str) -> Result<usize, StoreError>;

    /// Returns the number of rows removed.
    fn drop_all(&self) -> Result<usize, StoreError>;

    fn count_all(&self) -> Result<usize, StoreError>;

    /// Writes `value` at `locally known version + 1` (or 1 for a new key) in
    /// one atomic step and returns the version assigned.
    fn put_next_version(&self, key: &str, value: &str) -> Result<u64, StoreError>;

    /// Writes `record` unless the stored version is strictly greater.
    /// Returns whether the row was written.
    fn merge(&self, record: Record) -> Result<bool, StoreError>;
}
