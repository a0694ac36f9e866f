//! NATS JetStream key-value backend.
//!
//! Connects lazily on first use. Buckets are opened once and cached. A missing
//! bucket reads as empty and is created with server defaults on the first write.

use async_nats::jetstream::context::GetStreamErrorKind;
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::OnceCell;

use super::{KeyValueStore, KvEntry, KvError, Revision};

fn backend<E: std::fmt::Display>(context: &str) -> impl Fn(E) -> KvError + '_ {
    move |e| KvError::Backend(format!("{}: {}", context, e))
}

/// JetStream key-value store reached through one NATS connection.
pub struct NatsKvStore {
    url: String,
    context: OnceCell<jetstream::Context>,
    buckets: Mutex<HashMap<String, kv::Store>>,
}

impl NatsKvStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            context: OnceCell::new(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn jetstream(&self) -> Result<&jetstream::Context, KvError> {
        self.context
            .get_or_try_init(|| async {
                info!("Connecting to NATS at {}", self.url);
                let client = async_nats::connect(self.url.as_str())
                    .await
                    .map_err(backend("connect"))?;
                Ok::<_, KvError>(jetstream::new(client))
            })
            .await
    }

    /// Opens a bucket. A missing bucket is created when `create_missing` is set
    /// and reported as `None` otherwise; any other lookup failure is an error.
    async fn bucket(
        &self,
        name: &str,
        create_missing: bool,
    ) -> Result<Option<kv::Store>, KvError> {
        let cached = self.buckets.lock().get(name).cloned();
        if let Some(store) = cached {
            return Ok(Some(store));
        }

        let js = self.jetstream().await?;
        let store = match js.get_stream(format!("KV_{}", name)).await {
            Ok(_) => js.get_key_value(name).await.map_err(backend("open bucket"))?,
            Err(e) if is_stream_not_found(&e.kind()) => {
                if !create_missing {
                    return Ok(None);
                }
                debug!("Bucket {} does not exist, creating it", name);
                js.create_key_value(kv::Config {
                    bucket: name.to_string(),
                    ..Default::default()
                })
                .await
                .map_err(backend("create bucket"))?
            }
            Err(e) => return Err(backend("open bucket")(e)),
        };

        self.buckets.lock().insert(name.to_string(), store.clone());
        Ok(Some(store))
    }

    /// Opens a bucket for writing, creating it when missing.
    async fn writable_bucket(&self, name: &str) -> Result<kv::Store, KvError> {
        self.bucket(name, true)
            .await?
            .ok_or_else(|| KvError::Backend(format!("bucket {} unavailable", name)))
    }
}

/// True only for the server's stream-not-found answer, not for transport failures.
fn is_stream_not_found(kind: &GetStreamErrorKind) -> bool {
    match kind {
        GetStreamErrorKind::JetStream(e) => {
            e.error_code() == jetstream::ErrorCode::STREAM_NOT_FOUND
        }
        _ => false,
    }
}

#[async_trait]
impl KeyValueStore for NatsKvStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<KvEntry>, KvError> {
        // Reads never create buckets; a missing one holds no keys
        let Some(store) = self.bucket(bucket, false).await? else {
            return Ok(None);
        };
        let entry = store.entry(key).await.map_err(backend("get"))?;
        // Delete and purge markers read as an absent key
        Ok(entry
            .filter(|e| matches!(e.operation, kv::Operation::Put))
            .map(|e| KvEntry {
                value: e.value,
                revision: e.revision,
            }))
    }

    async fn put(&self, bucket: &str, key: &str, value: Bytes) -> Result<Revision, KvError> {
        let store = self.writable_bucket(bucket).await?;
        store.put(key, value).await.map_err(backend("put"))
    }

    async fn create(&self, bucket: &str, key: &str, value: Bytes) -> Result<Revision, KvError> {
        let store = self.writable_bucket(bucket).await?;
        store.create(key, value).await.map_err(backend("create"))
    }

    async fn update(
        &self,
        bucket: &str,
        key: &str,
        expected: Revision,
        value: Bytes,
    ) -> Result<Revision, KvError> {
        let store = self.writable_bucket(bucket).await?;
        store
            .update(key, value, expected)
            .await
            .map_err(backend("update"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nats_url() -> String {
        std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
    }

    #[test]
    fn test_connects_lazily() {
        let store = NatsKvStore::new("nats://nowhere:4222");
        assert_eq!(store.url(), "nats://nowhere:4222");
        assert!(store.context.get().is_none());
    }

    #[test]
    fn test_only_missing_stream_creates_bucket() {
        assert!(!is_stream_not_found(&GetStreamErrorKind::Request));
        assert!(!is_stream_not_found(&GetStreamErrorKind::EmptyName));
    }

    #[tokio::test]
    #[ignore] // needs a NATS server with JetStream
    async fn test_read_leaves_missing_bucket_alone() {
        let store = NatsKvStore::new(nats_url());
        let bucket = format!("test-kurec-ogp-{}", rand::random::<u32>());

        assert!(store.get(&bucket, "0123").await.unwrap().is_none());
        let js = store.jetstream().await.unwrap();
        assert!(js.get_stream(format!("KV_{}", bucket)).await.is_err());
    }

    #[tokio::test]
    #[ignore] // needs a NATS server with JetStream
    async fn test_revisioned_writes() {
        let store = NatsKvStore::new(nats_url());
        let bucket = format!("test-kurec-rules-{}", rand::random::<u32>());

        assert!(store.get(&bucket, "rules").await.unwrap().is_none());
        let first = store
            .create(&bucket, "rules", Bytes::from_static(b"[]"))
            .await
            .unwrap();
        assert!(store
            .create(&bucket, "rules", Bytes::from_static(b"[]"))
            .await
            .is_err());

        let second = store
            .update(&bucket, "rules", first, Bytes::from_static(b"[1]"))
            .await
            .unwrap();
        assert!(second > first);
        assert!(store
            .update(&bucket, "rules", first, Bytes::from_static(b"[2]"))
            .await
            .is_err());

        let entry = store.get(&bucket, "rules").await.unwrap().unwrap();
        assert_eq!(entry.value, Bytes::from_static(b"[1]"));
        assert_eq!(entry.revision, second);
    }
}
