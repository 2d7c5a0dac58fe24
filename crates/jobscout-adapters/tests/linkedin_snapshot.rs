mod common;

use chrono::{TimeZone, Utc};
use jobscout_adapters::{parse_linkedin_results, Normalizer};

#[test]
fn golden_json_snapshot_test_linkedin() {
    let parsed = parse_linkedin_results(&common::read_fixture("linkedin", "search.html")).unwrap();
    assert_eq!(common::to_golden(&parsed), common::read_snapshot("linkedin"));
}

#[test]
fn linkedin_listdate_becomes_posted_at() {
    let parsed = parse_linkedin_results(&common::read_fixture("linkedin", "search.html")).unwrap();
    assert_eq!(
        parsed[0].posted_at,
        Some(Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap())
    );
    assert_eq!(parsed[1].posted_at, None);
}

#[test]
fn linkedin_cards_normalize_without_blank_fields() {
    let parsed = parse_linkedin_results(&common::read_fixture("linkedin", "search.html")).unwrap();
    let scraped_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let normalizer = Normalizer::default();
    let postings = parsed
        .into_iter()
        .map(|raw| normalizer.normalize("linkedin", raw, scraped_at))
        .collect::<Vec<_>>();

    // The second card has no snippet, so its description is synthesized.
    assert_eq!(postings[1].description, "PHP Engineer at Initech");
    assert!(postings[0].tags.contains("laravel"));
    assert!(postings[0].tags.contains("remote"));
    assert!(postings.iter().all(|p| !p.title.is_empty() && !p.company.is_empty()));
}
