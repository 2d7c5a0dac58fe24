use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jobscout_core::{RawPosting, SearchQuery, SourceInfo};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::{matches_query, parse_timestamp, FetchError, SourceAdapter};

/// Reads postings from a JSON array on disk. A missing file is an empty source.
#[derive(Debug, Clone)]
pub struct StaticJsonAdapter {
    source: SourceInfo,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct StaticEntry {
    #[serde(default)]
    external_id: Option<JsonValue>,
    #[serde(default)]
    id: Option<JsonValue>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    requirements: Option<String>,
    #[serde(default)]
    salary: Option<String>,
    #[serde(default)]
    job_type: Option<String>,
    #[serde(default)]
    is_remote: Option<bool>,
    #[serde(default)]
    post_date: Option<String>,
    #[serde(default)]
    apply_link: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

fn id_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl StaticJsonAdapter {
    pub fn new(source: SourceInfo, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            path: path.into(),
        }
    }

    /// One adapter per `<slug>.json` in `dir`, sorted by slug.
    pub fn discover_dir(dir: impl AsRef<Path>) -> anyhow::Result<Vec<Self>> {
        use anyhow::Context;

        let dir = dir.as_ref();
        let mut adapters = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let slug = slug.to_string();
            adapters.push(Self::new(SourceInfo::new(slug.clone(), slug), path));
        }
        adapters.sort_by(|a, b| a.source.slug.cmp(&b.source.slug));
        Ok(adapters)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SourceAdapter for StaticJsonAdapter {
    fn source(&self) -> SourceInfo {
        self.source.clone()
    }

    async fn fetch(&self, query: &SearchQuery, limit: usize) -> Result<Vec<RawPosting>, FetchError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "static job file missing");
                return Ok(Vec::new());
            }
            Err(err) => {
                warn!(source_slug = %self.source.slug, path = %self.path.display(), error = %err, "static job file unreadable");
                return Ok(Vec::new());
            }
        };
        match parse_static_entries(&self.source.slug, &text) {
            Ok(entries) => Ok(entries
                .into_iter()
                .filter(|raw| matches_query(raw, query))
                .take(limit)
                .collect()),
            Err(err) => {
                warn!(source_slug = %self.source.slug, error = %err, "static job file unparsable");
                Ok(Vec::new())
            }
        }
    }
}

/// Entries without `external_id` or `id` are skipped.
pub fn parse_static_entries(source_slug: &str, text: &str) -> Result<Vec<RawPosting>, FetchError> {
    let entries: Vec<StaticEntry> = serde_json::from_str(text).map_err(|e| FetchError::Parse {
        source_slug: source_slug.to_string(),
        message: e.to_string(),
    })?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let external_id = entry
                .external_id
                .as_ref()
                .and_then(id_to_string)
                .or_else(|| entry.id.as_ref().and_then(id_to_string))?;
            Some(RawPosting {
                external_id,
                title: entry.title,
                company: entry.company,
                location: entry.location,
                description: entry.description.or(entry.requirements).unwrap_or_default(),
                url: entry.apply_link.unwrap_or_default(),
                salary: entry.salary,
                job_type: entry.job_type,
                is_remote: entry.is_remote.unwrap_or(false),
                posted_at: entry.post_date.as_deref().and_then(parse_timestamp),
                tags: entry.tags,
                summary: None,
            })
        })
        .collect())
}
