// examples/search_query_usage.rs
//
// Turning search page state into stored recording rules.
//
// Run with: cargo run --example search_query_usage

use rule_engine::{
    build, FacetSelections, RecordingRule, RuleCollection, RuleListParser, SearchQueryState,
    BROADCASTER_FACET, GENRE_FACET,
};

fn main() {
    println!("=== Search Query - Usage Examples ===\n");

    example_1_build();
    example_2_refinement_chips();
    example_3_rule_list();
}

/// Example 1: Canonicalizing free text and facets
fn example_1_build() {
    println!("Example 1: Canonical query");
    println!("==========================");

    let empty = build("", &FacetSelections::new());
    println!("empty state -> query={:?} filter={:?}", empty.query, empty.filter);

    let mut facets = FacetSelections::new();
    facets
        .entry(BROADCASTER_FACET.to_string())
        .or_default()
        .insert("NHK".to_string());
    let canonical = build("anime", &facets);
    println!("query:  {}", canonical.query);
    println!("filter: {}\n", canonical.filter);
}

/// Example 2: Editing the state the way the refinement list does
fn example_2_refinement_chips() {
    println!("Example 2: Refinement chips");
    println!("===========================");

    let mut state = SearchQueryState::from_refinement_list(
        "ダンダダン",
        [(BROADCASTER_FACET, vec!["TOKYO MX", "BS11"])],
    );
    state.toggle(GENRE_FACET, "アニメ／特撮");
    state.toggle(BROADCASTER_FACET, "BS11");

    println!("selected BS11? {}", state.is_selected(BROADCASTER_FACET, "BS11"));
    println!("filter: {}\n", state.to_canonical().filter);
}

/// Example 3: Rules in their stored form
fn example_3_rule_list() {
    println!("Example 3: Stored rule list");
    println!("===========================");

    let mut rules = RuleCollection::new();
    rules.push(build("ニュース", &FacetSelections::new()).into_rule(false));
    rules.push(
        RecordingRule::builder()
            .query("再放送")
            .ignore(true)
            .build(),
    );

    for rule in &rules {
        println!("{}", rule.describe());
    }

    match RuleListParser::to_json(&rules) {
        Ok(json) => println!("stored bytes: {}", json),
        Err(e) => println!("encoding failed: {}", e),
    }
}
