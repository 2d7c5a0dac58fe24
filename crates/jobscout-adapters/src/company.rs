use std::sync::Arc;

use async_trait::async_trait;
use jobscout_core::{RawPosting, SearchQuery, SourceInfo};
use jobscout_storage::HttpFetcher;
use serde_json::Value as JsonValue;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{html_to_text, matches_query, parse_timestamp, FetchError, SourceAdapter};

/// Company career feeds in JSON: either `{"jobs": [...]}` (Greenhouse board
/// API shape) or a bare array of job objects.
#[derive(Debug, Clone)]
pub struct CompanyFeedAdapter {
    http: Arc<HttpFetcher>,
    feeds: Vec<String>,
}

impl CompanyFeedAdapter {
    pub const SLUG: &'static str = "company";

    pub fn new(http: Arc<HttpFetcher>, feeds: Vec<String>) -> Self {
        Self { http, feeds }
    }

    pub fn feeds(&self) -> &[String] {
        &self.feeds
    }
}

#[async_trait]
impl SourceAdapter for CompanyFeedAdapter {
    fn source(&self) -> SourceInfo {
        SourceInfo::new(Self::SLUG, "Company Careers")
    }

    async fn fetch(&self, query: &SearchQuery, limit: usize) -> Result<Vec<RawPosting>, FetchError> {
        let span = info_span!("adapter_fetch", source_slug = Self::SLUG, feeds = self.feeds.len(), limit);
        async {
            let mut out = Vec::new();
            for feed_url in &self.feeds {
                if out.len() >= limit {
                    break;
                }
                let body = match self.http.fetch_text(Self::SLUG, feed_url, &[]).await {
                    Ok(resp) => resp.body,
                    Err(err) if err.is_recoverable() => {
                        warn!(feed_url = %feed_url, error = %err, "company feed fetch failed");
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                let parsed = match parse_company_feed(feed_url, &body) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        warn!(feed_url = %feed_url, error = %err, "company feed parse failed");
                        continue;
                    }
                };
                let remaining = limit - out.len();
                out.extend(
                    parsed
                        .into_iter()
                        .filter(|raw| matches_feed_search(raw, query) && matches_query(raw, query))
                        .take(remaining),
                );
            }
            debug!(count = out.len(), "company feeds collected");
            Ok(out)
        }
        .instrument(span)
        .await
    }
}

/// Feeds are not searchable server-side, so terms and locations are applied
/// locally against title, description and location.
fn matches_feed_search(raw: &RawPosting, query: &SearchQuery) -> bool {
    let title = raw.title.to_lowercase();
    let description = raw.description.to_lowercase();
    let location = raw.location.as_deref().unwrap_or_default().to_lowercase();
    let hit = |needle: &String| {
        let needle = needle.trim().to_lowercase();
        needle.is_empty() || title.contains(&needle) || description.contains(&needle) || location.contains(&needle)
    };
    (query.terms.is_empty() || query.terms.iter().any(hit))
        && (query.locations.is_empty() || query.locations.iter().any(hit))
}

fn company_from_feed_url(feed_url: &str) -> String {
    let without_scheme = feed_url.split("//").last().unwrap_or(feed_url);
    without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn json_str<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a str> {
    let mut cur = value;
    for segment in path {
        cur = cur.get(*segment)?;
    }
    cur.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn json_id(value: &JsonValue) -> Option<String> {
    match value.get("id")? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_company_feed(feed_url: &str, body: &str) -> Result<Vec<RawPosting>, FetchError> {
    let parse_err = |message: String| FetchError::Parse {
        source_slug: CompanyFeedAdapter::SLUG.to_string(),
        message,
    };
    let value: JsonValue =
        serde_json::from_str(body).map_err(|e| parse_err(format!("{feed_url}: {e}")))?;
    let entries = value
        .get("jobs")
        .and_then(JsonValue::as_array)
        .or_else(|| value.as_array())
        .ok_or_else(|| parse_err(format!("{feed_url}: expected a jobs array")))?;

    let feed_company = company_from_feed_url(feed_url);
    Ok(entries
        .iter()
        .map(|entry| {
            let title = json_str(entry, &["title"]).unwrap_or_default().to_string();
            let external_id = json_id(entry).unwrap_or_else(|| {
                Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{feed_url}:{title}").as_bytes()).to_string()
            });
            let description = json_str(entry, &["content"])
                .or_else(|| json_str(entry, &["description"]))
                .map(html_to_text)
                .unwrap_or_default();
            let location = json_str(entry, &["location", "name"])
                .or_else(|| json_str(entry, &["location"]))
                .map(ToString::to_string);
            let declared_remote = entry.get("remote").and_then(JsonValue::as_bool).unwrap_or(false);
            let tags = entry
                .get("tags")
                .and_then(JsonValue::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(ToString::to_string))
                        .collect()
                })
                .unwrap_or_default();
            RawPosting {
                external_id,
                company: json_str(entry, &["company_name"])
                    .or_else(|| json_str(entry, &["company"]))
                    .map(ToString::to_string)
                    .unwrap_or_else(|| feed_company.clone()),
                is_remote: declared_remote || description.to_lowercase().contains("remote"),
                url: json_str(entry, &["absolute_url"])
                    .or_else(|| json_str(entry, &["url"]))
                    .unwrap_or(feed_url)
                    .to_string(),
                salary: json_str(entry, &["salary"]).map(ToString::to_string),
                job_type: json_str(entry, &["employment_type"])
                    .or_else(|| json_str(entry, &["job_type"]))
                    .map(ToString::to_string),
                posted_at: json_str(entry, &["updated_at"])
                    .or_else(|| json_str(entry, &["published_at"]))
                    .and_then(parse_timestamp),
                summary: None,
                title,
                location,
                description,
                tags,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_name_defaults_to_feed_host() {
        assert_eq!(
            company_from_feed_url("https://boards-api.greenhouse.io/v1/boards/acme/jobs"),
            "boards-api.greenhouse.io"
        );
    }

    #[test]
    fn entries_without_ids_get_stable_uuid_ids() {
        let body = r#"[{"title": "Laravel Engineer", "description": "Remote PHP work"}]"#;
        let a = parse_company_feed("https://acme.test/jobs.json", body).unwrap();
        let b = parse_company_feed("https://acme.test/jobs.json", body).unwrap();
        assert_eq!(a[0].external_id, b[0].external_id);
        assert_eq!(a[0].company, "acme.test");
        assert_eq!(a[0].url, "https://acme.test/jobs.json");
        assert!(a[0].is_remote);
    }

    #[test]
    fn non_json_body_is_a_parse_error() {
        let err = parse_company_feed("https://acme.test/jobs", "<html></html>").unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn feed_search_filters_on_terms_and_locations() {
        let raw = RawPosting {
            title: "Senior Laravel Engineer".into(),
            description: "Work on billing".into(),
            location: Some("Berlin".into()),
            ..Default::default()
        };
        let mut query = SearchQuery {
            terms: vec!["laravel".into()],
            ..Default::default()
        };
        assert!(matches_feed_search(&raw, &query));
        query.locations = vec!["Lisbon".into()];
        assert!(!matches_feed_search(&raw, &query));
        query.locations = vec!["berlin".into()];
        assert!(matches_feed_search(&raw, &query));
    }
}
