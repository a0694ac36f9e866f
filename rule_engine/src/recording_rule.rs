// Recording rules as they are stored in the key-value store
//
// A recording rule is a saved search: the free-text query and filter expression
// that select programs, plus a flag saying whether matches are recorded or
// ignored. Individual rules pin a single program instead of a search.
//
// Field names on the wire are camelCase (`id`, `isIgnore`, `query`, `filter`);
// the web front end reads and writes the same records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a recording rule.
///
/// New ids are UUIDv7 strings, so they sort by creation time. Ids written by
/// other clients are kept as-is whatever their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// Generates a new time-ordered id.
    pub fn generate() -> Self {
        RuleId(Uuid::now_v7().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        RuleId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::generate()
    }
}

impl From<String> for RuleId {
    fn from(s: String) -> Self {
        RuleId(s)
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        RuleId(s.to_string())
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Recording Rule
// ============================================================================

/// A saved search that includes or excludes matching EPG entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingRule {
    pub id: RuleId,
    /// True when matching programs are excluded from recording
    pub is_ignore: bool,
    pub query: String,
    pub filter: String,
}

impl RecordingRule {
    pub fn new(query: impl Into<String>, filter: impl Into<String>, is_ignore: bool) -> Self {
        Self {
            id: RuleId::generate(),
            is_ignore,
            query: query.into(),
            filter: filter.into(),
        }
    }

    pub fn builder() -> RecordingRuleBuilder {
        RecordingRuleBuilder::default()
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn is_ignore(&self) -> bool {
        self.is_ignore
    }

    pub fn describe(&self) -> String {
        format!(
            "Rule[ID: {}, {}, query: {:?}, filter: {:?}]",
            self.id,
            if self.is_ignore { "ignore" } else { "record" },
            self.query,
            self.filter
        )
    }
}

/// Builder for [`RecordingRule`]. Unset fields default to a generated id, an
/// empty query/filter and a recording (not ignoring) rule.
#[derive(Debug, Default)]
pub struct RecordingRuleBuilder {
    id: Option<RuleId>,
    is_ignore: Option<bool>,
    query: Option<String>,
    filter: Option<String>,
}

impl RecordingRuleBuilder {
    pub fn new() -> Self {
        RecordingRuleBuilder::default()
    }

    pub fn id(mut self, id: impl Into<RuleId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn ignore(mut self, is_ignore: bool) -> Self {
        self.is_ignore = Some(is_ignore);
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn build(self) -> RecordingRule {
        RecordingRule {
            id: self.id.unwrap_or_else(RuleId::generate),
            is_ignore: self.is_ignore.unwrap_or(false),
            query: self.query.unwrap_or_default(),
            filter: self.filter.unwrap_or_default(),
        }
    }
}

// ============================================================================
// Individual Rule
// ============================================================================

/// Record/ignore instruction for one program picked from the search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualRule {
    pub program_id: i64,
    pub service_id: i64,
    pub is_ignore: bool,
}

impl IndividualRule {
    pub fn record(program_id: i64, service_id: i64) -> Self {
        Self {
            program_id,
            service_id,
            is_ignore: false,
        }
    }

    pub fn ignore(program_id: i64, service_id: i64) -> Self {
        Self {
            program_id,
            service_id,
            is_ignore: true,
        }
    }
}
