// Ordered rule lists and their stored byte form
//
// All rules of one kind live in a single value under one key. The value is a
// UTF-8 JSON array of rule objects, appended to in place. Order is insertion
// order; nothing here deduplicates by id.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recording_rule::{IndividualRule, RecordingRule};

/// Append-only list of rules, serialized as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleList<R> {
    rules: Vec<R>,
}

/// Search-based recording rules
pub type RuleCollection = RuleList<RecordingRule>;

/// Per-program record/ignore rules
pub type IndividualRuleCollection = RuleList<IndividualRule>;

impl<R> RuleList<R> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn single(rule: R) -> Self {
        Self { rules: vec![rule] }
    }

    /// Adds a rule after all existing ones.
    pub fn push(&mut self, rule: R) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[R] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<R> {
        self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rules.iter()
    }
}

impl<R> Default for RuleList<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> From<Vec<R>> for RuleList<R> {
    fn from(rules: Vec<R>) -> Self {
        Self { rules }
    }
}

impl<R> FromIterator<R> for RuleList<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl<'a, R> IntoIterator for &'a RuleList<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl RuleCollection {
    pub fn find(&self, id: &str) -> Option<&RecordingRule> {
        self.rules.iter().find(|rule| rule.id.as_str() == id)
    }
}

impl<R: DeserializeOwned> RuleList<R> {
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        RuleListParser::from_json_bytes(bytes)
    }
}

impl<R: Serialize> RuleList<R> {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ParseError> {
        RuleListParser::to_json_bytes(self)
    }
}

/// JSON codec for stored rule lists.
pub struct RuleListParser;

impl RuleListParser {
    /// Parse a rule list from a JSON string
    pub fn from_json<R: DeserializeOwned>(json: &str) -> Result<RuleList<R>, ParseError> {
        serde_json::from_str(json).map_err(|e| ParseError::JsonParseError(e.to_string()))
    }

    /// Parse a rule list from stored bytes; the bytes must be UTF-8
    pub fn from_json_bytes<R: DeserializeOwned>(bytes: &[u8]) -> Result<RuleList<R>, ParseError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ParseError::InvalidFormat(format!("not UTF-8: {}", e)))?;
        Self::from_json(text)
    }

    /// Compact JSON, the same shape the web client writes
    pub fn to_json<R: Serialize>(list: &RuleList<R>) -> Result<String, ParseError> {
        serde_json::to_string(list).map_err(|e| ParseError::SerializationError(e.to_string()))
    }

    pub fn to_json_bytes<R: Serialize>(list: &RuleList<R>) -> Result<Vec<u8>, ParseError> {
        serde_json::to_vec(list).map_err(|e| ParseError::SerializationError(e.to_string()))
    }
}

/// Parse Errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording_rule::RuleId;

    fn rule(id: &str, query: &str, is_ignore: bool) -> RecordingRule {
        RecordingRule {
            id: RuleId::new(id),
            is_ignore,
            query: query.to_string(),
            filter: String::new(),
        }
    }

    #[test]
    fn stored_form_is_a_bare_array() {
        let list = RuleCollection::single(rule("a", "anime", false));
        let json = RuleListParser::to_json(&list).unwrap();
        assert_eq!(
            json,
            r#"[{"id":"a","isIgnore":false,"query":"anime","filter":""}]"#
        );
    }

    #[test]
    fn bytes_roundtrip_preserves_order_and_fields() {
        let list: RuleCollection = vec![
            rule("1", "ニュース", false),
            rule("2", "天気", true),
            rule("1", "duplicate id", false),
        ]
        .into();

        let bytes = list.to_json_bytes().unwrap();
        let back = RuleCollection::from_json_bytes(&bytes).unwrap();
        assert_eq!(back, list);
        assert_eq!(back.rules()[1].query, "天気");
        assert_eq!(back.find("2").map(|r| r.is_ignore), Some(true));
    }

    #[test]
    fn reads_arrays_written_by_the_web_client() {
        let written = r#"[{"query":"ダンダダン","filter":"( 放送局 IN [ \"TOKYO MX\" ] )","isIgnore":false,"id":"01JD4T7Q"}]"#;
        let list = RuleCollection::from_json_bytes(written.as_bytes()).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.rules()[0].filter, "( 放送局 IN [ \"TOKYO MX\" ] )");
    }

    #[test]
    fn rejects_objects_and_bad_bytes() {
        let wrapped = br#"{"rules": []}"#;
        assert!(matches!(
            RuleCollection::from_json_bytes(wrapped),
            Err(ParseError::JsonParseError(_))
        ));
        assert!(matches!(
            RuleCollection::from_json_bytes(&[0xff, 0xfe]),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn decoding_needs_only_deserialize() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct ReadOnly {
            id: String,
        }

        let list = RuleList::<ReadOnly>::from_json_bytes(br#"[{"id":"a"},{"id":"b"}]"#).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.rules()[1].id, "b");
    }

    #[test]
    fn individual_rules_share_the_codec() {
        let mut list = IndividualRuleCollection::new();
        list.push(IndividualRule::record(10, 20));
        list.push(IndividualRule::ignore(11, 20));
        let back = IndividualRuleCollection::from_json_bytes(&list.to_json_bytes().unwrap()).unwrap();
        assert_eq!(back.into_rules(), list.rules().to_vec());
    }
}
