mod common;

use jobscout_adapters::{matches_query, parse_indeed_results};
use jobscout_core::SearchQuery;

#[test]
fn golden_json_snapshot_test_indeed() {
    let parsed = parse_indeed_results(&common::read_fixture("indeed", "search.html")).unwrap();
    assert_eq!(common::to_golden(&parsed), common::read_snapshot("indeed"));
}

#[test]
fn indeed_snippet_list_items_are_flattened() {
    let parsed = parse_indeed_results(&common::read_fixture("indeed", "search.html")).unwrap();
    assert_eq!(
        parsed[0].description,
        "Maintain REST APIs in PHP. Fully remote, full-time."
    );
    assert_eq!(parsed[0].summary.as_deref(), Some(parsed[0].description.as_str()));
}

#[test]
fn indeed_remote_only_query_keeps_remote_cards() {
    let parsed = parse_indeed_results(&common::read_fixture("indeed", "search.html")).unwrap();
    let query = SearchQuery {
        remote_only: true,
        ..Default::default()
    };
    let kept = parsed
        .iter()
        .filter(|raw| matches_query(raw, &query))
        .map(|raw| raw.external_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(kept, vec!["9f3c1a2b4d5e6f70"]);
}
