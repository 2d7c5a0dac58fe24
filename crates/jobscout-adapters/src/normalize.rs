//! Raw-to-canonical normalization and keyword tagging.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jobscout_core::{
    clean_whitespace, Posting, RawPosting, SearchQuery, UNKNOWN_COMPANY, UNKNOWN_TITLE,
};
use serde::Deserialize;

pub const SUMMARY_WIDTH: usize = 200;

const SUMMARY_PLACEHOLDER: &str = "...";

/// Annual working hours used to compare hourly rates against a yearly floor.
const HOURS_PER_YEAR: f64 = 2080.0;

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "python",
    "django",
    "flask",
    "fastapi",
    "php",
    "laravel",
    "node.js",
    "react",
    "vue",
    "aws",
    "azure",
    "gcp",
    "remote",
    "full-time",
    "contract",
    "rest",
    "graphql",
    "sql",
    "postgresql",
    "mysql",
    "docker",
    "kubernetes",
    "devops",
    "microservices",
];

#[derive(Debug, Clone, Deserialize)]
struct TagRulesFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    rules: Vec<TagRule>,
}

/// Adds `tag` when any needle occurs in the posting text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagRule {
    pub tag: String,
    pub contains_any: Vec<String>,
}

/// Keyword tagger: a keyword set where every hit tags itself, plus YAML rules
/// that map several needles to one tag.
#[derive(Debug, Clone)]
pub struct TagService {
    keywords: BTreeSet<String>,
    rules: Vec<TagRule>,
}

impl Default for TagService {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            rules: Vec::new(),
        }
    }
}

impl TagService {
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords.extend(
            keywords
                .into_iter()
                .map(|k| clean_whitespace(k.as_ref()).to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        self
    }

    pub fn with_rules_yaml(mut self, yaml: &str) -> Result<Self> {
        let file: TagRulesFile = serde_yaml::from_str(yaml).context("parsing tag rules")?;
        self.rules.extend(file.rules);
        Ok(self)
    }

    pub fn with_rules_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        self.with_rules_yaml(&yaml)
            .with_context(|| format!("loading {}", path.display()))
    }

    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }

    pub fn tags_for(&self, text: &str) -> BTreeSet<String> {
        let haystack = text.to_lowercase();
        let mut tags = self
            .keywords
            .iter()
            .filter(|kw| contains_term(&haystack, kw))
            .cloned()
            .collect::<BTreeSet<_>>();
        for rule in &self.rules {
            if rule
                .contains_any
                .iter()
                .any(|needle| contains_term(&haystack, &needle.to_lowercase()))
            {
                tags.insert(rule.tag.to_lowercase());
            }
        }
        tags
    }
}

/// `needle` occurs in `haystack` with no alphanumeric neighbour on either side,
/// so `rest` does not tag "interest".
fn contains_term(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before = haystack[..begin].chars().next_back();
        let after = haystack[end..].chars().next();
        let bounded = |c: Option<char>| c.map_or(true, |c| !c.is_alphanumeric());
        if bounded(before) && bounded(after) {
            return true;
        }
        start = begin + haystack[begin..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Shorten to `width` characters on a word boundary, ending with `...`.
pub fn summarize(text: &str, width: usize) -> String {
    let cleaned = clean_whitespace(text);
    if cleaned.chars().count() <= width {
        return cleaned;
    }
    let budget = width.saturating_sub(SUMMARY_PLACEHOLDER.len());
    let mut out = String::new();
    for word in cleaned.split(' ') {
        let extra = if out.is_empty() { 0 } else { 1 };
        if out.chars().count() + extra + word.chars().count() > budget {
            break;
        }
        if extra == 1 {
            out.push(' ');
        }
        out.push_str(word);
    }
    out.push_str(SUMMARY_PLACEHOLDER);
    out
}

/// Upper bound of a free-text salary in yearly units, when one can be read.
///
/// Commas are ignored, a trailing `k` multiplies by 1000 and hourly figures are
/// annualized.
pub fn salary_upper_bound(text: &str) -> Option<f64> {
    let lower = text.to_lowercase().replace(',', "");
    let hourly = lower.contains("/hr") || lower.contains("hour");
    let chars = lower.chars().collect::<Vec<_>>();
    let mut values = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let mut current = String::new();
        let mut seen_dot = false;
        while i < chars.len() {
            let ch = chars[i];
            if ch.is_ascii_digit() {
                current.push(ch);
            } else if ch == '.' && !seen_dot && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
                current.push(ch);
                seen_dot = true;
            } else {
                break;
            }
            i += 1;
        }
        if let Ok(mut value) = current.parse::<f64>() {
            if chars.get(i) == Some(&'k') {
                value *= 1000.0;
            }
            values.push(value);
        }
    }
    let upper = values.into_iter().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    })?;
    Some(if hourly { upper * HOURS_PER_YEAR } else { upper })
}

fn mentions_remote(raw: &RawPosting) -> bool {
    raw.is_remote
        || [
            raw.location.as_deref(),
            Some(raw.description.as_str()),
            raw.summary.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains("remote"))
}

/// Remote-only and salary-floor filters. A salary that cannot be read never
/// excludes a posting.
pub fn matches_query(raw: &RawPosting, query: &SearchQuery) -> bool {
    if query.remote_only && !mentions_remote(raw) {
        return false;
    }
    if let Some(floor) = query.salary_min {
        if let Some(upper) = raw.salary.as_deref().and_then(salary_upper_bound) {
            if upper < f64::from(floor) {
                return false;
            }
        }
    }
    true
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Turns adapter output into canonical postings. Never emits an empty title,
/// company or description.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    tags: TagService,
}

impl Normalizer {
    pub fn new(tags: TagService) -> Self {
        Self { tags }
    }

    pub fn tag_service(&self) -> &TagService {
        &self.tags
    }

    pub fn normalize(
        &self,
        source_slug: &str,
        raw: RawPosting,
        scraped_at: DateTime<Utc>,
    ) -> Posting {
        let is_remote = mentions_remote(&raw);
        let title = non_empty(clean_whitespace(&raw.title)).unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let company =
            non_empty(clean_whitespace(&raw.company)).unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
        let location = raw.location.as_deref().map(clean_whitespace).and_then(non_empty);
        let raw_summary = raw.summary.as_deref().map(clean_whitespace).and_then(non_empty);
        let description = non_empty(raw.description.trim().to_string())
            .or_else(|| raw_summary.clone())
            .unwrap_or_else(|| format!("{title} at {company}"));
        let summary = raw_summary.unwrap_or_else(|| summarize(&description, SUMMARY_WIDTH));

        let mut tags = raw
            .tags
            .iter()
            .map(|t| clean_whitespace(t).to_lowercase())
            .filter(|t| !t.is_empty())
            .collect::<BTreeSet<_>>();
        tags.extend(self.tags.tags_for(&format!("{title}\n{description}\n{summary}")));

        Posting {
            id: None,
            source_slug: source_slug.to_string(),
            external_id: raw.external_id.trim().to_string(),
            title,
            company,
            location,
            description,
            url: raw.url.trim().to_string(),
            salary: raw.salary.as_deref().map(clean_whitespace).and_then(non_empty),
            job_type: raw.job_type.as_deref().map(clean_whitespace).and_then(non_empty),
            is_remote,
            tags,
            posted_at: raw.posted_at,
            scraped_at,
            summary: Some(summary),
        }
    }
}
