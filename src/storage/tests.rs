//! Storage Module Tests
//!
//! Validates the local record store the replication engine writes through.
//!
//! ## Test Scopes
//! - **CRUD**: put/get/delete/drop/count over `MemoryStore`.
//! - **Version rules**: atomic version assignment and never-regress merging.
//!
//! *Note: replication across nodes is exercised in the `dynamo` module tests.*

#[cfg(test)]
mod tests {
    use crate::storage::memory::MemoryStore;
    use crate::storage::{LocalStore, Record};
    use std::sync::Arc;

    // ============================================================
    // BASIC CRUD TESTS
    // ============================================================

    #[test]
    fn test_put_and_get() {
        let store = MemoryStore::new();
        store.put(Record::new("k", "v", 3)).unwrap();

        let record = store.get("k").unwrap().unwrap();
        assert_eq!(record, Record::new("k", "v", 3));
        assert_eq!(store.version("k").unwrap(), Some(3));
    }

    #[test]
    fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert!(store.get("nope").unwrap().is_none());
        assert!(store.version("nope").unwrap().is_none());
    }

    #[test]
    fn test_put_replaces_on_conflict() {
        let store = MemoryStore::new();
        store.put(Record::new("k", "old", 5)).unwrap();
        store.put(Record::new("k", "new", 2)).unwrap();

        // Plain put is an upsert; version rules live in merge/put_next_version
        assert_eq!(store.get("k").unwrap().unwrap().value, "new");
        assert_eq!(store.count_all().unwrap(), 1);
    }

    #[test]
    fn test_delete_key_reports_affected_rows() {
        let store = MemoryStore::new();
        store.put(Record::new("k", "v", 1)).unwrap();

        assert_eq!(store.delete_key("k").unwrap(), 1);
        assert_eq!(store.delete_key("k").unwrap(), 0);
    }

    #[test]
    fn test_drop_all_and_count() {
        let store = MemoryStore::with_records((0..7).map(|i| Record::new(format!("k{}", i), "v", 1)));
        assert_eq!(store.count_all().unwrap(), 7);
        assert_eq!(store.scan_all().unwrap().len(), 7);

        assert_eq!(store.drop_all().unwrap(), 7);
        assert_eq!(store.count_all().unwrap(), 0);
    }

    // ============================================================
    // VERSION RULE TESTS
    // ============================================================

    #[test]
    fn test_put_next_version_starts_at_one_and_increments() {
        let store = MemoryStore::new();
        assert_eq!(store.put_next_version("k", "a").unwrap(), 1);
        assert_eq!(store.put_next_version("k", "b").unwrap(), 2);

        let record = store.get("k").unwrap().unwrap();
        assert_eq!(record.value, "b");
        assert_eq!(record.version, 2);
    }

    #[test]
    fn test_put_next_version_continues_from_merged_version() {
        let store = MemoryStore::new();
        store.merge(Record::new("k", "remote", 9)).unwrap();
        assert_eq!(store.put_next_version("k", "local").unwrap(), 10);
    }

    #[test]
    fn test_merge_never_regresses() {
        let store = MemoryStore::new();
        assert!(store.merge(Record::new("k", "v5", 5)).unwrap());

        assert!(!store.merge(Record::new("k", "v4", 4)).unwrap());
        assert_eq!(store.get("k").unwrap().unwrap().value, "v5");

        // Equal version is accepted but leaves the version unchanged
        assert!(store.merge(Record::new("k", "v5b", 5)).unwrap());
        assert_eq!(store.version("k").unwrap(), Some(5));

        assert!(store.merge(Record::new("k", "v6", 6)).unwrap());
        assert_eq!(store.get("k").unwrap().unwrap(), Record::new("k", "v6", 6));
    }

    #[tokio::test]
    async fn test_concurrent_put_next_version_assigns_unique_versions() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();

        for i in 0..50 {
            let store: Arc<MemoryStore> = store.clone();
            handles.push(tokio::spawn(async move {
                store.put_next_version("hot", &format!("v{}", i)).unwrap()
            }));
        }

        let mut versions = Vec::new();
        for handle in handles {
            versions.push(handle.await.unwrap());
        }
        versions.sort();
        assert_eq!(versions, (1..=50).collect::<Vec<u64>>());
    }
}
