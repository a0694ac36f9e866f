//! # Rule Store Writer
//!
//! Appends rules to the shared rule list kept under one key of the key-value
//! store. Concurrent writers coordinate only through the store's revision check:
//! each attempt reads the list and its revision, appends locally and writes back
//! conditionally. A lost race sends the writer back to a fresh read until the
//! retry budget runs out.
//!
//! [`RuleStoreWriter::append_rule`] gives up silently after the last attempt and
//! only logs. [`RuleStoreWriter::try_append_rule`] runs the same loop and reports
//! exhaustion to the caller.

use bytes::Bytes;
use log::{debug, error, info, warn};
use rule_engine::{
    IndividualRule, IndividualRuleCollection, ParseError, RecordingRule, RetryPolicy,
    RuleCollection, RuleList,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::config::KurecConfig;
use crate::kv::{KeyValueStore, KvError, Revision};

/// Key holding a rule list inside its bucket
pub const RULES_KEY: &str = "rules";

// ================================================================================================
// OPTIONS AND RESULTS
// ================================================================================================

/// How the first rule is written when the key does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsentKeyWrite {
    /// Unconditional put. Two writers racing on a fresh key can overwrite each other.
    #[default]
    Put,
    /// Create-if-absent; losing the race is retried like a revision mismatch.
    Create,
}

/// Location of one rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSlot {
    pub bucket: String,
    pub key: String,
}

impl RuleSlot {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: RULES_KEY.to_string(),
        }
    }
}

/// Successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Revision of the written list
    pub revision: Revision,
    /// Attempts used, starting at 1
    pub attempts: u32,
}

/// Failure of a single read or write against a rule list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleStoreError {
    #[error(transparent)]
    Store(#[from] KvError),

    #[error("stored rule list is unreadable: {0}")]
    Decode(ParseError),

    #[error("rule list could not be encoded: {0}")]
    Encode(ParseError),
}

impl RuleStoreError {
    /// True when another writer changed the list first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RuleStoreError::Store(e) if e.is_conflict())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppendError {
    #[error("gave up appending to {bucket}/{key} after {attempts} attempts: {last_error}")]
    Exhausted {
        bucket: String,
        key: String,
        attempts: u32,
        last_error: RuleStoreError,
    },
}

impl AppendError {
    pub fn attempts(&self) -> u32 {
        match self {
            AppendError::Exhausted { attempts, .. } => *attempts,
        }
    }
}

// ================================================================================================
// APPEND STATE MACHINE
// ================================================================================================

/// Steps of one append. Every attempt starts at `ReadStore`.
#[derive(Debug)]
enum AppendState<R> {
    ReadStore,
    KeyAbsentCreate,
    KeyPresentUpdate {
        rules: RuleList<R>,
        revision: Revision,
    },
    Success(Revision),
    RetryableFailure(RuleStoreError),
    ExhaustedFailure(RuleStoreError),
}

// ================================================================================================
// WRITER
// ================================================================================================

/// Appends recording rules and individual rules to their lists.
pub struct RuleStoreWriter {
    store: Arc<dyn KeyValueStore>,
    rules: RuleSlot,
    individual_rules: RuleSlot,
    policy: RetryPolicy,
    absent_key_write: AbsentKeyWrite,
}

impl RuleStoreWriter {
    /// Writer over the buckets named by `config`, five immediate attempts.
    pub fn new(store: Arc<dyn KeyValueStore>, config: &KurecConfig) -> Self {
        Self {
            store,
            rules: RuleSlot::new(config.rule_bucket()),
            individual_rules: RuleSlot::new(config.individual_rule_bucket()),
            policy: RetryPolicy::default(),
            absent_key_write: AbsentKeyWrite::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_absent_key_write(mut self, mode: AbsentKeyWrite) -> Self {
        self.absent_key_write = mode;
        self
    }

    pub fn rule_slot(&self) -> &RuleSlot {
        &self.rules
    }

    pub fn individual_rule_slot(&self) -> &RuleSlot {
        &self.individual_rules
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Appends a recording rule. Exhaustion is logged and otherwise ignored.
    pub async fn append_rule(&self, rule: RecordingRule) {
        let _ = self.append_to(&self.rules, rule).await;
    }

    /// Appends a recording rule and reports whether it was persisted.
    pub async fn try_append_rule(&self, rule: RecordingRule) -> Result<AppendOutcome, AppendError> {
        self.append_to(&self.rules, rule).await
    }

    /// Current recording rules; empty when nothing was stored yet.
    pub async fn list_rules(&self) -> Result<RuleCollection, RuleStoreError> {
        self.read_list(&self.rules).await
    }

    pub async fn append_individual_rule(&self, rule: IndividualRule) {
        let _ = self.append_to(&self.individual_rules, rule).await;
    }

    pub async fn try_append_individual_rule(
        &self,
        rule: IndividualRule,
    ) -> Result<AppendOutcome, AppendError> {
        self.append_to(&self.individual_rules, rule).await
    }

    pub async fn list_individual_rules(&self) -> Result<IndividualRuleCollection, RuleStoreError> {
        self.read_list(&self.individual_rules).await
    }

    async fn read_list<R: DeserializeOwned>(
        &self,
        slot: &RuleSlot,
    ) -> Result<RuleList<R>, RuleStoreError> {
        match self.store.get(&slot.bucket, &slot.key).await? {
            Some(entry) => {
                RuleList::from_json_bytes(&entry.value).map_err(RuleStoreError::Decode)
            }
            None => Ok(RuleList::new()),
        }
    }

    /// Runs the read-append-write loop until it succeeds or the budget is spent.
    async fn append_to<R>(&self, slot: &RuleSlot, rule: R) -> Result<AppendOutcome, AppendError>
    where
        R: Serialize + DeserializeOwned + Clone + Send + Sync,
    {
        let max_attempts = self.policy.max_attempts();
        // Zero-based index of the attempt in progress
        let mut attempt: u32 = 0;
        let mut state = AppendState::ReadStore;

        loop {
            state = match state {
                AppendState::ReadStore => match self.store.get(&slot.bucket, &slot.key).await {
                    Ok(None) => AppendState::KeyAbsentCreate,
                    Ok(Some(entry)) => match RuleList::<R>::from_json_bytes(&entry.value) {
                        Ok(rules) => AppendState::KeyPresentUpdate {
                            rules,
                            revision: entry.revision,
                        },
                        Err(e) => AppendState::RetryableFailure(RuleStoreError::Decode(e)),
                    },
                    Err(e) => AppendState::RetryableFailure(e.into()),
                },

                AppendState::KeyAbsentCreate => {
                    match RuleList::single(rule.clone()).to_json_bytes() {
                        Ok(bytes) => {
                            let value = Bytes::from(bytes);
                            let written = match self.absent_key_write {
                                AbsentKeyWrite::Put => {
                                    self.store.put(&slot.bucket, &slot.key, value).await
                                }
                                AbsentKeyWrite::Create => {
                                    self.store.create(&slot.bucket, &slot.key, value).await
                                }
                            };
                            match written {
                                Ok(revision) => AppendState::Success(revision),
                                Err(e) => AppendState::RetryableFailure(e.into()),
                            }
                        }
                        Err(e) => AppendState::RetryableFailure(RuleStoreError::Encode(e)),
                    }
                }

                AppendState::KeyPresentUpdate {
                    mut rules,
                    revision,
                } => {
                    rules.push(rule.clone());
                    match rules.to_json_bytes() {
                        Ok(bytes) => match self
                            .store
                            .update(&slot.bucket, &slot.key, revision, Bytes::from(bytes))
                            .await
                        {
                            Ok(revision) => AppendState::Success(revision),
                            Err(e) => AppendState::RetryableFailure(e.into()),
                        },
                        Err(e) => AppendState::RetryableFailure(RuleStoreError::Encode(e)),
                    }
                }

                AppendState::Success(revision) => {
                    info!(
                        "Appended rule to {}/{} at revision {} (attempt {})",
                        slot.bucket,
                        slot.key,
                        revision,
                        attempt + 1
                    );
                    return Ok(AppendOutcome {
                        revision,
                        attempts: attempt + 1,
                    });
                }

                AppendState::RetryableFailure(cause) => {
                    warn!(
                        "Rule append to {}/{} {} on attempt {}/{}: {}",
                        slot.bucket,
                        slot.key,
                        if cause.is_conflict() {
                            "lost a concurrent write"
                        } else {
                            "failed"
                        },
                        attempt + 1,
                        max_attempts,
                        cause
                    );
                    attempt += 1;
                    if attempt >= max_attempts {
                        AppendState::ExhaustedFailure(cause)
                    } else {
                        self.pause(attempt - 1).await;
                        AppendState::ReadStore
                    }
                }

                AppendState::ExhaustedFailure(cause) => {
                    error!(
                        "Giving up on rule append to {}/{} after {} attempts; rule not stored",
                        slot.bucket, slot.key, attempt
                    );
                    return Err(AppendError::Exhausted {
                        bucket: slot.bucket.clone(),
                        key: slot.key.clone(),
                        attempts: attempt,
                        last_error: cause,
                    });
                }
            };
        }
    }

    /// Waits out the policy's delay after a failed attempt; no-op without backoff.
    async fn pause(&self, failed_attempt: u32) {
        if !self.policy.has_backoff() {
            return;
        }
        let delay = {
            let mut rng = rand::thread_rng();
            self.policy.delay_for(failed_attempt, &mut rng)
        };
        debug!("Retrying rule append in {} ms", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}
