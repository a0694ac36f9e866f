//! # Key-Value Store Seam
//!
//! Revisioned key-value storage the rule writer and thumbnail proxy run on.
//!
//! Every successful write to a key gets a new, larger revision from the store.
//! Writers that must not clobber each other read a revision first and write with
//! [`KeyValueStore::update`], which only succeeds while that revision is current.

pub mod memory;
#[cfg(feature = "nats")]
pub mod nats;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use memory::MemoryKvStore;
#[cfg(feature = "nats")]
pub use nats::NatsKvStore;

/// Store-assigned version of a key
pub type Revision = u64;

/// Current value of a key together with its revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub value: Bytes,
    pub revision: Revision,
}

/// Errors reported by a [`KeyValueStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvError {
    /// Conditional update lost: the key moved past the expected revision
    #[error("revision mismatch on {bucket}/{key}: expected {expected}, current {current:?}")]
    RevisionMismatch {
        bucket: String,
        key: String,
        expected: Revision,
        current: Option<Revision>,
    },

    /// Create-if-absent found an existing value
    #[error("key {bucket}/{key} already exists")]
    AlreadyExists { bucket: String, key: String },

    /// Transport or server failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl KvError {
    /// True when another writer got there first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, KvError::RevisionMismatch { .. } | KvError::AlreadyExists { .. })
    }
}

/// Revisioned key-value store, one namespace per bucket.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Current value and revision, or `None` when the key does not exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<KvEntry>, KvError>;

    /// Unconditional create or overwrite.
    async fn put(&self, bucket: &str, key: &str, value: Bytes) -> Result<Revision, KvError>;

    /// Create only when the key does not exist yet.
    async fn create(&self, bucket: &str, key: &str, value: Bytes) -> Result<Revision, KvError>;

    /// Overwrite only while the key is still at `expected`.
    async fn update(
        &self,
        bucket: &str,
        key: &str,
        expected: Revision,
        value: Bytes,
    ) -> Result<Revision, KvError>;
}
