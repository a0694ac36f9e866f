// Faceted search state and its canonical filter form
//
// The search page keeps a free-text query plus, per facet attribute, the set of
// refinement values the user picked. Before a rule can be stored, that state is
// flattened into the `{query, filter}` pair the search index understands:
//
//   ( ジャンル IN [ "アニメ／特撮" ] ) AND ( 放送局 IN [ "NHK", "TOKYO MX" ] )
//
// Facets are kept in ordered collections, so clauses come out sorted by attribute
// name and values sorted within each clause. The same state always renders the
// same filter string.
//
// Values are written between double quotes exactly as given. Nothing is escaped,
// so a value containing `"` produces a filter the index will reject or misread.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::recording_rule::{RecordingRule, RuleId};

/// Facet attribute for program genres in the EPG index
pub const GENRE_FACET: &str = "ジャンル";

/// Facet attribute for the broadcasting station in the EPG index
pub const BROADCASTER_FACET: &str = "放送局";

/// Selected refinement values keyed by facet attribute name
pub type FacetSelections = BTreeMap<String, BTreeSet<String>>;

// ============================================================================
// Search State
// ============================================================================

/// Transient search state as edited on the search page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQueryState {
    free_text: String,
    facets: FacetSelections,
}

impl SearchQueryState {
    pub fn new(free_text: impl Into<String>, facets: FacetSelections) -> Self {
        Self {
            free_text: free_text.into(),
            facets,
        }
    }

    /// Builds state from a UI-style refinement list (`attribute -> [values]`).
    /// Duplicate values collapse.
    pub fn from_refinement_list<I, K, V, S>(free_text: impl Into<String>, refinements: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut facets = FacetSelections::new();
        for (attribute, values) in refinements {
            let entry = facets.entry(attribute.into()).or_default();
            entry.extend(values.into_iter().map(Into::into));
        }
        Self::new(free_text, facets)
    }

    pub fn free_text(&self) -> &str {
        &self.free_text
    }

    pub fn facets(&self) -> &FacetSelections {
        &self.facets
    }

    pub fn set_free_text(&mut self, free_text: impl Into<String>) {
        self.free_text = free_text.into();
    }

    /// Adds a value to a facet. Returns false if it was already selected.
    pub fn select(&mut self, attribute: impl Into<String>, value: impl Into<String>) -> bool {
        self.facets
            .entry(attribute.into())
            .or_default()
            .insert(value.into())
    }

    /// Removes a value from a facet; the attribute goes away with its last value.
    pub fn deselect(&mut self, attribute: &str, value: &str) -> bool {
        let Some(values) = self.facets.get_mut(attribute) else {
            return false;
        };
        let removed = values.remove(value);
        if values.is_empty() {
            self.facets.remove(attribute);
        }
        removed
    }

    /// Flips a refinement chip. Returns true if the value is selected afterwards.
    pub fn toggle(&mut self, attribute: &str, value: &str) -> bool {
        if self.deselect(attribute, value) {
            false
        } else {
            self.select(attribute, value);
            true
        }
    }

    pub fn clear_facet(&mut self, attribute: &str) {
        self.facets.remove(attribute);
    }

    pub fn is_selected(&self, attribute: &str, value: &str) -> bool {
        self.facets
            .get(attribute)
            .is_some_and(|values| values.contains(value))
    }

    /// Canonical form of the current state.
    pub fn to_canonical(&self) -> CanonicalQuery {
        build(&self.free_text, &self.facets)
    }
}

// ============================================================================
// Canonical Query
// ============================================================================

/// Index-ready query: free text plus filter expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalQuery {
    pub query: String,
    pub filter: String,
}

impl CanonicalQuery {
    pub fn has_filter(&self) -> bool {
        !self.filter.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.filter.is_empty()
    }

    /// Turns the query into a new rule with a freshly generated id.
    pub fn into_rule(self, is_ignore: bool) -> RecordingRule {
        RecordingRule {
            id: RuleId::generate(),
            is_ignore,
            query: self.query,
            filter: self.filter,
        }
    }
}

/// Canonicalizes free text and facet selections.
///
/// Every attribute with at least one value yields `( attr IN [ "v1", "v2" ] )`;
/// clauses are joined with ` AND `. Attributes with no values are skipped and an
/// empty selection map gives an empty filter.
pub fn build(free_text: &str, facets: &FacetSelections) -> CanonicalQuery {
    CanonicalQuery {
        query: free_text.to_string(),
        filter: build_filter(facets),
    }
}

/// Filter expression part of [`build`].
pub fn build_filter(facets: &FacetSelections) -> String {
    facets
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(attribute, values)| in_clause(attribute, values))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn in_clause(attribute: &str, values: &BTreeSet<String>) -> String {
    let quoted = values
        .iter()
        .map(|v| format!("\"{}\"", v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("( {} IN [ {} ] )", attribute, quoted)
}
