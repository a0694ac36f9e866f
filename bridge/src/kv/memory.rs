//! In-process key-value store with per-bucket revision counters.
//!
//! Behaves like a JetStream bucket for the operations the rule writer uses:
//! revisions start at 1 and every write in a bucket takes the next one.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{KeyValueStore, KvEntry, KvError, Revision};

#[derive(Debug, Default)]
struct Bucket {
    /// Last revision handed out in this bucket
    sequence: Revision,
    entries: HashMap<String, KvEntry>,
}

impl Bucket {
    fn write(&mut self, key: &str, value: Bytes) -> Revision {
        self.sequence += 1;
        let revision = self.sequence;
        self.entries
            .insert(key.to_string(), KvEntry { value, revision });
        revision
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys in a bucket.
    pub fn key_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .get(bucket)
            .map(|b| b.entries.len())
            .unwrap_or(0)
    }

    /// Synchronous read, handy for assertions.
    pub fn peek(&self, bucket: &str, key: &str) -> Option<KvEntry> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|b| b.entries.get(key).cloned())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<KvEntry>, KvError> {
        Ok(self.peek(bucket, key))
    }

    async fn put(&self, bucket: &str, key: &str, value: Bytes) -> Result<Revision, KvError> {
        let mut buckets = self.buckets.write();
        Ok(buckets.entry(bucket.to_string()).or_default().write(key, value))
    }

    async fn create(&self, bucket: &str, key: &str, value: Bytes) -> Result<Revision, KvError> {
        let mut buckets = self.buckets.write();
        let slot = buckets.entry(bucket.to_string()).or_default();
        if slot.entries.contains_key(key) {
            return Err(KvError::AlreadyExists {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(slot.write(key, value))
    }

    async fn update(
        &self,
        bucket: &str,
        key: &str,
        expected: Revision,
        value: Bytes,
    ) -> Result<Revision, KvError> {
        let mut buckets = self.buckets.write();
        let slot = buckets.entry(bucket.to_string()).or_default();
        let current = slot.entries.get(key).map(|e| e.revision);
        if current != Some(expected) {
            return Err(KvError::RevisionMismatch {
                bucket: bucket.to_string(),
                key: key.to_string(),
                expected,
                current,
            });
        }
        Ok(slot.write(key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revisions_increase_per_bucket() {
        let store = MemoryKvStore::new();
        let r1 = store.put("b", "x", Bytes::from_static(b"1")).await.unwrap();
        let r2 = store.put("b", "y", Bytes::from_static(b"2")).await.unwrap();
        let other = store.put("c", "x", Bytes::from_static(b"3")).await.unwrap();
        assert_eq!((r1, r2, other), (1, 2, 1));
        assert_eq!(store.key_count("b"), 2);

        let entry = store.get("b", "x").await.unwrap().unwrap();
        assert_eq!(entry.value, Bytes::from_static(b"1"));
        assert_eq!(entry.revision, 1);
        assert!(store.get("b", "missing").await.unwrap().is_none());
        assert!(store.get("nope", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_checks_revision() {
        let store = MemoryKvStore::new();
        let rev = store.put("b", "k", Bytes::from_static(b"a")).await.unwrap();

        let next = store
            .update("b", "k", rev, Bytes::from_static(b"b"))
            .await
            .unwrap();
        assert!(next > rev);

        let stale = store.update("b", "k", rev, Bytes::from_static(b"c")).await;
        match stale {
            Err(err @ KvError::RevisionMismatch { .. }) => {
                assert!(err.is_conflict());
                assert!(err.to_string().contains("expected 1"));
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
        assert_eq!(store.peek("b", "k").unwrap().value, Bytes::from_static(b"b"));

        let absent = store.update("b", "none", 1, Bytes::new()).await;
        assert!(matches!(
            absent,
            Err(KvError::RevisionMismatch { current: None, .. })
        ));
    }

    #[tokio::test]
    async fn create_refuses_existing_key() {
        let store = MemoryKvStore::new();
        store.create("b", "k", Bytes::from_static(b"a")).await.unwrap();
        let again = store.create("b", "k", Bytes::from_static(b"b")).await;
        assert!(matches!(again, Err(KvError::AlreadyExists { .. })));
        assert_eq!(store.peek("b", "k").unwrap().value, Bytes::from_static(b"a"));
    }
}
