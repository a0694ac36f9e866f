pub mod search_query;
pub mod recording_rule;
pub mod rule_list;
pub mod retry_policy;
pub mod program_document;

pub use search_query::{
    build, build_filter, CanonicalQuery, FacetSelections, SearchQueryState,
    BROADCASTER_FACET, GENRE_FACET,
};

pub use recording_rule::{
    IndividualRule, RecordingRule, RecordingRuleBuilder, RuleId,
};

pub use rule_list::{
    IndividualRuleCollection, // Per-program rules
    ParseError,               // Codec errors
    RuleCollection,           // Search-based recording rules
    RuleList,                 // Generic append-only list
    RuleListParser,           // JSON (de)serialization
};

pub use retry_policy::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

pub use program_document::{is_ogp_hash, jst, ogp_hash_for_url, ProgramDocument};
