//! # KuRec Bridge Library
//!
//! Store-facing side of recording rules: appending rules to the shared
//! key-value store, serving program thumbnails and previewing rule queries
//! against the search index.

// Core modules
pub mod config;
pub mod kv;
pub mod ogp;
pub mod rule_store;
pub mod search;

// Re-export commonly used types
pub use config::{ConfigError, KurecConfig};
pub use kv::{KeyValueStore, KvEntry, KvError, MemoryKvStore, Revision};
#[cfg(feature = "nats")]
pub use kv::NatsKvStore;
pub use ogp::{OgpError, OgpImage, OgpImageProxy, OGP_CONTENT_TYPE};
pub use rule_store::{
    AbsentKeyWrite, AppendError, AppendOutcome, RuleSlot, RuleStoreError, RuleStoreWriter,
    RULES_KEY,
};
pub use search::{MeilisearchClient, SearchError, SearchPage, SearchRequest};
