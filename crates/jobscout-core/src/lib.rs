//! Core domain model for JobScout: postings, identity keys, candidate profile, match results.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const CRATE_NAME: &str = "jobscout-core";

pub const UNKNOWN_TITLE: &str = "Unknown Role";
pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Normalized search request shared by every source adapter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub terms: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub job_types: Vec<String>,
    #[serde(default)]
    pub remote_only: bool,
    #[serde(default)]
    pub salary_min: Option<u32>,
}

/// Stable slug/name pair an adapter registers under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub slug: String,
    pub name: String,
}

impl SourceInfo {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
        }
    }
}

/// Storage-side registry row for a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

/// Adapter output before normalization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPosting {
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: String,
    pub url: String,
    pub salary: Option<String>,
    pub job_type: Option<String>,
    pub is_remote: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
}

/// Strong dedup/upsert key: `(source_slug, external_id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    pub source_slug: String,
    pub external_id: String,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_slug, self.external_id)
    }
}

/// Cross-source key: lowercased `(title, company, location-or-empty)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SoftKey {
    pub title: String,
    pub company: String,
    pub location: String,
}

/// Canonical job record.
///
/// `id` is assigned by storage on first upsert; `source_slug` and `external_id`
/// are frozen once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub id: Option<i64>,
    pub source_slug: String,
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: String,
    pub url: String,
    pub salary: Option<String>,
    pub job_type: Option<String>,
    pub is_remote: bool,
    pub tags: BTreeSet<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub scraped_at: DateTime<Utc>,
    pub summary: Option<String>,
}

impl Posting {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            source_slug: self.source_slug.clone(),
            external_id: self.external_id.clone(),
        }
    }

    pub fn soft_key(&self) -> SoftKey {
        SoftKey {
            title: clean_whitespace(&self.title).to_lowercase(),
            company: clean_whitespace(&self.company).to_lowercase(),
            location: self
                .location
                .as_deref()
                .map(|l| clean_whitespace(l).to_lowercase())
                .unwrap_or_default(),
        }
    }

    /// Text the relevance model sees: title, company, description, summary and tags.
    pub fn scoring_text(&self) -> String {
        let tags = self.tags.iter().cloned().collect::<Vec<_>>().join(" ");
        [
            self.title.as_str(),
            self.company.as_str(),
            self.description.as_str(),
            self.summary.as_deref().unwrap_or_default(),
            tags.as_str(),
        ]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
    }

    /// Whole days since `posted_at`; `None` when the source reported no date.
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.posted_at.map(|posted| (now - posted).num_days())
    }
}

/// Job seeker's resume text plus structured profile JSON.
///
/// Only `corpus` takes part in scoring; `skills` and `profile` are display data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub resume_text: String,
    pub profile: JsonValue,
    pub skills: Vec<String>,
    pub corpus: String,
}

impl CandidateProfile {
    pub fn new(resume_text: impl Into<String>, profile: JsonValue) -> Self {
        let resume_text = resume_text.into();
        let flattened = flatten_profile(&profile);
        let corpus = [resume_text.as_str(), flattened.as_str()]
            .iter()
            .map(|part| clean_whitespace(part))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let skills = profile
            .get("skills")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            resume_text,
            profile,
            skills,
            corpus,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.trim().is_empty()
    }
}

/// Flatten nested profile JSON into newline-separated text, depth first.
pub fn flatten_profile(value: &JsonValue) -> String {
    let parts: Vec<String> = match value {
        JsonValue::Null => Vec::new(),
        JsonValue::String(s) => vec![s.clone()],
        JsonValue::Bool(b) => vec![b.to_string()],
        JsonValue::Number(n) => vec![n.to_string()],
        JsonValue::Array(items) => items.iter().map(flatten_profile).collect(),
        JsonValue::Object(map) => map.values().map(flatten_profile).collect(),
    };
    parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ephemeral ranking result; recomputed on every match request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub posting: Posting,
    /// Cosine similarity in `[0, 1]`.
    pub similarity: f64,
    pub recency_bonus: f64,
    /// `similarity + recency_bonus`; unbounded above, not a probability.
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    PendingReview,
    Applied,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::PendingReview => "pending_review",
            ApplicationStatus::Applied => "applied",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ApplicationStatus::Pending),
            "pending_review" => Some(ApplicationStatus::PendingReview),
            "applied" => Some(ApplicationStatus::Applied),
            _ => None,
        }
    }
}

/// Application tracked by the outer layer; the pipeline only writes `match_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: i64,
    pub posting_id: i64,
    pub status: ApplicationStatus,
    pub resume_path: Option<String>,
    pub cover_letter_path: Option<String>,
    pub match_score: Option<f64>,
    pub auto_submitted: bool,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Last flattened candidate corpus, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCorpusCache {
    pub text: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UpsertOutcome {
    pub created: usize,
    pub updated: usize,
    pub saved: Vec<Posting>,
}

/// Collapse runs of whitespace and trim.
pub fn clean_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn posting(title: &str, company: &str, location: Option<&str>) -> Posting {
        Posting {
            id: None,
            source_slug: "indeed".into(),
            external_id: "abc".into(),
            title: title.into(),
            company: company.into(),
            location: location.map(ToString::to_string),
            description: "Build APIs".into(),
            url: "https://example.test/abc".into(),
            salary: None,
            job_type: None,
            is_remote: false,
            tags: BTreeSet::from(["php".to_string(), "laravel".to_string()]),
            posted_at: None,
            scraped_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            summary: None,
        }
    }

    #[test]
    fn soft_key_is_case_and_whitespace_insensitive() {
        let a = posting("Senior  Laravel Developer", "ACME", Some("Remote"));
        let b = posting("senior laravel developer", "acme ", Some(" remote"));
        assert_eq!(a.soft_key(), b.soft_key());
        let c = posting("senior laravel developer", "acme", None);
        assert_eq!(c.soft_key().location, "");
    }

    #[test]
    fn identity_key_displays_slug_and_external_id() {
        assert_eq!(posting("t", "c", None).identity_key().to_string(), "indeed:abc");
    }

    #[test]
    fn scoring_text_includes_tags_and_skips_empty_parts() {
        let text = posting("Dev", "ACME", None).scoring_text();
        assert_eq!(text, "Dev\nACME\nBuild APIs\nlaravel php");
    }

    #[test]
    fn candidate_corpus_flattens_nested_profile() {
        let profile = CandidateProfile::new(
            "  Laravel   engineer ",
            json!({
                "summary": "Backend developer",
                "skills": ["php", "laravel"],
                "experience": [{"company": "ACME", "years": 5}]
            }),
        );
        assert!(profile.corpus.starts_with("Laravel engineer\n"));
        assert!(profile.corpus.contains("Backend developer"));
        assert!(profile.corpus.contains("ACME"));
        assert_eq!(profile.skills, vec!["php".to_string(), "laravel".to_string()]);
        assert!(!profile.is_empty());
    }

    #[test]
    fn blank_resume_and_profile_yield_empty_corpus() {
        let profile = CandidateProfile::new("   ", json!({}));
        assert!(profile.is_empty());
    }

    #[test]
    fn age_days_counts_whole_days() {
        let mut p = posting("t", "c", None);
        p.posted_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let now = Utc.with_ymd_and_hms(2024, 1, 4, 11, 0, 0).unwrap();
        assert_eq!(p.age_days(now), Some(2));
    }
}
