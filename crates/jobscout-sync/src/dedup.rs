use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use jobscout_core::Posting;
use tracing::debug;

/// Collapses postings that describe the same job.
///
/// Two passes: the soft key `(title, company, location)` merges the same opening
/// seen on different boards, then the identity key `(source_slug, external_id)`
/// merges repeats within one source. Both passes keep the posting that
/// [`DedupEngine::prefer`] ranks highest, so the survivor does not depend on
/// input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupEngine;

fn described_len(posting: &Posting) -> usize {
    posting.description.trim().chars().count()
}

impl DedupEngine {
    pub fn new() -> Self {
        Self
    }

    /// Total order over postings; `Greater` means `a` should be kept over `b`.
    ///
    /// Later `posted_at` wins (a dated posting beats an undated one), then the
    /// longer description, then the smaller identity key. Remaining fields only
    /// break ties between postings that agree on all of those.
    pub fn prefer(a: &Posting, b: &Posting) -> Ordering {
        a.posted_at
            .cmp(&b.posted_at)
            .then_with(|| described_len(a).cmp(&described_len(b)))
            .then_with(|| b.identity_key().cmp(&a.identity_key()))
            .then_with(|| {
                let key = |p: &Posting| {
                    (
                        p.description.clone(),
                        p.title.clone(),
                        p.company.clone(),
                        p.location.clone(),
                        p.url.clone(),
                        p.salary.clone(),
                        p.job_type.clone(),
                        p.summary.clone(),
                        p.tags.clone(),
                        p.is_remote,
                        p.scraped_at,
                    )
                };
                key(b).cmp(&key(a))
            })
    }

    pub fn dedupe(&self, postings: Vec<Posting>) -> Vec<Posting> {
        let input = postings.len();
        let soft = self.collapse_by(postings, Posting::soft_key);
        let after_soft = soft.len();
        let strong = self.collapse_by(soft, Posting::identity_key);
        debug!(input, after_soft, output = strong.len(), "deduplicated postings");
        strong
    }

    pub fn dedupe_by_identity(&self, postings: Vec<Posting>) -> Vec<Posting> {
        self.collapse_by(postings, Posting::identity_key)
    }

    pub fn dedupe_by_soft_key(&self, postings: Vec<Posting>) -> Vec<Posting> {
        self.collapse_by(postings, Posting::soft_key)
    }

    /// Output is ordered by key.
    fn collapse_by<K: Ord>(&self, postings: Vec<Posting>, key: fn(&Posting) -> K) -> Vec<Posting> {
        let mut kept: BTreeMap<K, Posting> = BTreeMap::new();
        for posting in postings {
            match kept.entry(key(&posting)) {
                Entry::Vacant(slot) => {
                    slot.insert(posting);
                }
                Entry::Occupied(mut slot) => {
                    if Self::prefer(&posting, slot.get()) == Ordering::Greater {
                        slot.insert(posting);
                    }
                }
            }
        }
        kept.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    fn posting(source: &str, id: &str, title: &str, description: &str) -> Posting {
        Posting {
            id: None,
            source_slug: source.into(),
            external_id: id.into(),
            title: title.into(),
            company: "ACME".into(),
            location: Some("Remote".into()),
            description: description.into(),
            url: format!("https://example.test/{id}"),
            salary: None,
            job_type: None,
            is_remote: true,
            tags: BTreeSet::new(),
            posted_at: None,
            scraped_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            summary: None,
        }
    }

    fn fixture_a_b() -> (Posting, Posting) {
        let mut a = posting("indeed", "1", "Laravel Developer", &"x".repeat(50));
        a.posted_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut b = posting("indeed", "1", "Laravel Developer (updated)", &"y".repeat(10));
        b.posted_at = Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        (a, b)
    }

    #[test]
    fn later_posted_at_wins_regardless_of_order() {
        let (a, b) = fixture_a_b();
        let engine = DedupEngine::new();
        let forward = engine.dedupe(vec![a.clone(), b.clone()]);
        let backward = engine.dedupe(vec![b.clone(), a]);
        assert_eq!(forward, vec![b.clone()]);
        assert_eq!(backward, vec![b]);
    }

    #[test]
    fn longer_description_wins_when_undated() {
        let (mut a, mut b) = fixture_a_b();
        a.posted_at = None;
        b.posted_at = None;
        let engine = DedupEngine::new();
        assert_eq!(engine.dedupe(vec![a.clone(), b.clone()]), vec![a.clone()]);
        assert_eq!(engine.dedupe(vec![b, a.clone()]), vec![a]);
    }

    #[test]
    fn dated_posting_beats_undated_one() {
        let (mut a, b) = fixture_a_b();
        a.posted_at = None;
        assert_eq!(DedupEngine::prefer(&b, &a), Ordering::Greater);
    }

    #[test]
    fn soft_key_collapses_across_sources() {
        let mut linkedin = posting("linkedin", "900", "Senior Laravel Developer", "Short");
        linkedin.company = "Acme".into();
        let indeed = posting("indeed", "abc", "senior laravel  developer", "A longer description");
        let other = posting("indeed", "def", "Vue Developer", "Frontend");
        let out = DedupEngine::new().dedupe(vec![linkedin, indeed.clone(), other.clone()]);
        assert_eq!(out, vec![indeed, other]);
    }

    #[test]
    fn identical_rank_falls_back_to_identity_key() {
        let a = posting("linkedin", "2", "Dev", "same");
        let mut b = posting("indeed", "9", "Dev", "same");
        b.url = a.url.clone();
        let engine = DedupEngine::new();
        assert_eq!(engine.dedupe(vec![a.clone(), b.clone()]), vec![b.clone()]);
        assert_eq!(engine.dedupe(vec![b.clone(), a]), vec![b]);
    }

    #[test]
    fn identity_pass_keeps_distinct_keys() {
        let out = DedupEngine::new().dedupe_by_identity(vec![
            posting("indeed", "2", "Dev", "d"),
            posting("indeed", "1", "Dev", "d"),
            posting("indeed", "2", "Dev", "d"),
        ]);
        let ids = out.iter().map(|p| p.external_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
