mod common;

use chrono::{TimeZone, Utc};
use jobscout_adapters::{parse_company_feed, Normalizer, TagService};

const FEED_URL: &str = "https://boards-api.greenhouse.io/v1/boards/acme/jobs";

#[test]
fn golden_json_snapshot_test_company_feed() {
    let parsed = parse_company_feed(FEED_URL, &common::read_fixture("company", "greenhouse.json")).unwrap();
    assert_eq!(common::to_golden(&parsed), common::read_snapshot("company"));
}

#[test]
fn company_feed_content_is_unescaped_and_dated() {
    let parsed = parse_company_feed(FEED_URL, &common::read_fixture("company", "greenhouse.json")).unwrap();
    assert_eq!(
        parsed[0].description,
        "Own our Laravel billing platform. Docker and AWS experience helps."
    );
    assert_eq!(
        parsed[0].posted_at,
        Some(Utc.with_ymd_and_hms(2024, 2, 12, 14, 30, 0).unwrap())
    );
}

#[test]
fn company_feed_postings_pick_up_rule_tags() {
    let parsed = parse_company_feed(FEED_URL, &common::read_fixture("company", "greenhouse.json")).unwrap();
    let tags = TagService::default()
        .with_rules_file(common::workspace_root().join("rules/tags.yaml"))
        .unwrap();
    let normalizer = Normalizer::new(tags);
    let scraped_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let posting = normalizer.normalize("company", parsed[0].clone(), scraped_at);

    // Location says remote even though the body does not.
    assert!(posting.is_remote);
    let tags = posting.tags.iter().map(String::as_str).collect::<Vec<_>>();
    assert_eq!(tags, vec!["aws", "docker", "laravel", "php"]);
}
