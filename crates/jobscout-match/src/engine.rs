use chrono::{DateTime, Utc};
use jobscout_core::{MatchResult, Posting};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tfidf::fit_transform;
use crate::MatchError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Results whose final score is below this are dropped.
    pub min_score: f64,
    /// Bonus for a posting dated today.
    pub recency_cap: f64,
    /// Bonus lost per day of age.
    pub decay_per_day: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_score: 0.35,
            recency_cap: 0.2,
            decay_per_day: 0.01,
        }
    }
}

/// Ranks postings against a candidate corpus.
///
/// The vocabulary is refit from the corpus and the given postings on every
/// call, so scores from different calls are not comparable.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// `max(0, cap - decay * age_days)`; undated postings get nothing and
    /// postings dated in the future get the full cap.
    pub fn recency_bonus(&self, posting: &Posting, now: DateTime<Utc>) -> f64 {
        match posting.age_days(now) {
            Some(age) => (self.config.recency_cap - self.config.decay_per_day * age.max(0) as f64).max(0.0),
            None => 0.0,
        }
    }

    /// Score every posting, unfiltered and in input order.
    pub fn score(
        &self,
        corpus: &str,
        postings: Vec<Posting>,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchResult>, MatchError> {
        if corpus.trim().is_empty() {
            return Err(MatchError::ProfileMissing);
        }
        if postings.is_empty() {
            return Ok(Vec::new());
        }

        let texts = postings.iter().map(Posting::scoring_text).collect::<Vec<_>>();
        let documents = std::iter::once(corpus)
            .chain(texts.iter().map(String::as_str))
            .collect::<Vec<_>>();
        let vectors = fit_transform(&documents);
        let (candidate, posting_vectors) = vectors.split_at(1);
        let candidate = &candidate[0];

        Ok(postings
            .into_iter()
            .zip(posting_vectors)
            .map(|(posting, vector)| {
                let similarity = candidate.cosine(vector);
                let recency_bonus = self.recency_bonus(&posting, now);
                MatchResult {
                    posting,
                    similarity,
                    recency_bonus,
                    score: similarity + recency_bonus,
                }
            })
            .collect())
    }

    /// Drop results under `min_score`, then a stable descending sort capped at `limit`.
    pub fn filter_and_rank(&self, results: Vec<MatchResult>, limit: usize) -> Vec<MatchResult> {
        let total = results.len();
        let mut kept = results
            .into_iter()
            .filter(|r| r.score >= self.config.min_score)
            .collect::<Vec<_>>();
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));
        kept.truncate(limit);
        debug!(total, kept = kept.len(), min_score = self.config.min_score, "ranked postings");
        kept
    }

    pub fn rank(
        &self,
        corpus: &str,
        postings: Vec<Posting>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let scored = self.score(corpus, postings, now)?;
        Ok(self.filter_and_rank(scored, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn posting(id: &str, description: &str) -> Posting {
        Posting {
            id: None,
            source_slug: "indeed".into(),
            external_id: id.into(),
            title: "Role".into(),
            company: "Co".into(),
            location: None,
            description: description.into(),
            url: format!("https://example.test/{id}"),
            salary: None,
            job_type: None,
            is_remote: false,
            tags: BTreeSet::new(),
            posted_at: None,
            scraped_at: now(),
            summary: None,
        }
    }

    fn result_with_score(id: &str, score: f64) -> MatchResult {
        MatchResult {
            posting: posting(id, "text"),
            similarity: score,
            recency_bonus: 0.0,
            score,
        }
    }

    fn open_engine() -> ScoringEngine {
        ScoringEngine::new(ScoringConfig {
            min_score: 0.0,
            ..ScoringConfig::default()
        })
    }

    #[test]
    fn threshold_drops_low_scores_and_sorts_descending() {
        let engine = ScoringEngine::default();
        let ranked = engine.filter_and_rank(
            vec![
                result_with_score("low", 0.1),
                result_with_score("mid", 0.4),
                result_with_score("high", 0.9),
            ],
            10,
        );
        let scores = ranked.iter().map(|r| r.score).collect::<Vec<_>>();
        assert_eq!(scores, vec![0.9, 0.4]);
    }

    #[test]
    fn ties_keep_input_order_and_limit_caps_output() {
        let ranked = open_engine().filter_and_rank(
            vec![
                result_with_score("a", 0.5),
                result_with_score("b", 0.7),
                result_with_score("c", 0.5),
                result_with_score("d", 0.5),
            ],
            3,
        );
        let ids = ranked.iter().map(|r| r.posting.external_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn more_overlap_ranks_higher() {
        let corpus = "laravel php mysql docker kubernetes";
        let postings = vec![
            posting("two", "laravel php"),
            posting("five", "laravel php mysql docker kubernetes"),
            posting("one", "laravel"),
            posting("four", "laravel php mysql docker"),
            posting("three", "laravel php mysql"),
        ];
        let ranked = open_engine().rank(corpus, postings, 10, now()).unwrap();
        let ids = ranked.iter().map(|r| r.posting.external_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["five", "four", "three", "two", "one"]);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(ranked.iter().all(|r| (0.0..=1.0).contains(&r.similarity)));
    }

    #[test]
    fn empty_corpus_is_profile_missing() {
        let err = ScoringEngine::default()
            .rank("  \n ", vec![posting("a", "laravel")], 10, now())
            .unwrap_err();
        assert!(matches!(err, MatchError::ProfileMissing));

        let err = ScoringEngine::default().rank("", Vec::new(), 10, now()).unwrap_err();
        assert!(matches!(err, MatchError::ProfileMissing));
    }

    #[test]
    fn posting_without_usable_text_scores_zero() {
        let mut empty = posting("empty", "the and of");
        empty.title = "A".into();
        empty.company = "B".into();
        let scored = open_engine().score("laravel php", vec![empty], now()).unwrap();
        assert_eq!(scored[0].similarity, 0.0);
        assert_eq!(scored[0].score, 0.0);
    }

    #[test]
    fn recency_bonus_decays_linearly_and_floors_at_zero() {
        let engine = ScoringEngine::default();
        let mut p = posting("a", "laravel");
        assert_eq!(engine.recency_bonus(&p, now()), 0.0);

        p.posted_at = Some(now() - Duration::days(5));
        assert!((engine.recency_bonus(&p, now()) - 0.15).abs() < 1e-9);

        p.posted_at = Some(now() - Duration::days(40));
        assert_eq!(engine.recency_bonus(&p, now()), 0.0);

        p.posted_at = Some(now() + Duration::days(3));
        assert!((engine.recency_bonus(&p, now()) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn final_score_is_not_clamped() {
        let mut p = posting("a", "laravel php");
        p.title = "Laravel".into();
        p.company = "PHP".into();
        p.posted_at = Some(now());
        let scored = open_engine().score("laravel php", vec![p], now()).unwrap();
        assert!(scored[0].similarity > 0.99);
        assert!(scored[0].score > 1.0);
    }
}
