//! Thumbnail lookup for program listings.
//!
//! OGP images are fetched and converted to WebP elsewhere and stored in the
//! `<prefix>-ogp` bucket under the SHA-1 hex of their source URL. This module
//! serves them back by hash.

use bytes::Bytes;
use log::debug;
use rule_engine::is_ogp_hash;
use std::sync::Arc;
use thiserror::Error;

use crate::config::KurecConfig;
use crate::kv::{KeyValueStore, KvError};

/// Content type of every stored thumbnail
pub const OGP_CONTENT_TYPE: &str = "image/webp";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OgpError {
    /// Unknown hash, or not a hash at all
    #[error("thumbnail {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] KvError),
}

/// Stored thumbnail body with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OgpImage {
    pub bytes: Bytes,
    pub content_type: &'static str,
}

pub struct OgpImageProxy {
    store: Arc<dyn KeyValueStore>,
    bucket: String,
}

impl OgpImageProxy {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &KurecConfig) -> Self {
        Self {
            store,
            bucket: config.ogp_bucket(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Thumbnail stored under `hash`.
    ///
    /// Anything that is not 40 hex digits is reported as not found without a
    /// store lookup, so arbitrary path segments never reach the bucket.
    pub async fn fetch(&self, hash: &str) -> Result<OgpImage, OgpError> {
        if !is_ogp_hash(hash) {
            debug!("Rejected thumbnail lookup for malformed hash {:?}", hash);
            return Err(OgpError::NotFound(hash.to_string()));
        }

        match self.store.get(&self.bucket, hash).await? {
            Some(entry) => Ok(OgpImage {
                bytes: entry.value,
                content_type: OGP_CONTENT_TYPE,
            }),
            None => Err(OgpError::NotFound(hash.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use rule_engine::ogp_hash_for_url;

    #[tokio::test]
    async fn test_fetch_stored_thumbnail() {
        let store = Arc::new(MemoryKvStore::new());
        let hash = ogp_hash_for_url("https://example.com/ogp.png");
        store
            .put("kurec-ogp", &hash, Bytes::from_static(b"RIFF....WEBP"))
            .await
            .unwrap();

        let proxy = OgpImageProxy::new(store, &KurecConfig::default());
        let image = proxy.fetch(&hash).await.unwrap();
        assert_eq!(image.content_type, "image/webp");
        assert_eq!(image.bytes, Bytes::from_static(b"RIFF....WEBP"));
    }

    #[tokio::test]
    async fn test_unknown_hash_is_not_found() {
        let store = Arc::new(MemoryKvStore::new());
        let proxy = OgpImageProxy::new(store, &KurecConfig::default());
        let hash = ogp_hash_for_url("https://example.com/missing.png");
        assert_eq!(proxy.fetch(&hash).await, Err(OgpError::NotFound(hash)));
    }

    #[tokio::test]
    async fn test_malformed_hash_skips_store() {
        let store = Arc::new(MemoryKvStore::new());
        store
            .put("kurec-ogp", "rules", Bytes::from_static(b"[]"))
            .await
            .unwrap();

        let proxy = OgpImageProxy::new(store, &KurecConfig::default());
        assert!(matches!(proxy.fetch("rules").await, Err(OgpError::NotFound(_))));
        assert!(matches!(
            proxy.fetch("../kurec-meilisearch-rules").await,
            Err(OgpError::NotFound(_))
        ));
    }
}
