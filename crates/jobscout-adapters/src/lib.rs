//! Source adapter contract, the shared HTML helpers, and the concrete job-board adapters.

mod company;
mod glassdoor;
mod indeed;
mod linkedin;
pub mod normalize;
mod static_json;

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use jobscout_core::{clean_whitespace, RawPosting, SearchQuery, SourceInfo};
use jobscout_storage::HttpFetcher;
use scraper::{ElementRef, Selector};
use tracing::{debug, warn};

pub use company::{parse_company_feed, CompanyFeedAdapter};
pub use glassdoor::{parse_glassdoor_results, GlassdoorAdapter};
pub use indeed::{parse_indeed_results, IndeedAdapter};
pub use jobscout_storage::FetchError;
pub use linkedin::{parse_linkedin_results, LinkedInAdapter};
pub use normalize::{matches_query, salary_upper_bound, summarize, Normalizer, TagService};
pub use static_json::{parse_static_entries, StaticJsonAdapter};

pub const CRATE_NAME: &str = "jobscout-adapters";

/// One external job board.
///
/// Recoverable conditions (timeouts, non-2xx, unparsable pages) are logged and
/// reduce the result instead of failing; only contract violations such as an
/// invalid selector or missing configuration come back as `Err`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceInfo;

    async fn fetch(&self, query: &SearchQuery, limit: usize) -> Result<Vec<RawPosting>, FetchError>;
}

/// One search request in the terms x locations x pages fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub term: String,
    pub location: String,
    pub page: usize,
}

/// Expand a query into concrete page requests. Empty term or location lists
/// search once with an empty value.
pub fn search_plan(query: &SearchQuery, pages: usize) -> Vec<SearchRequest> {
    let terms = non_empty_or_blank(&query.terms);
    let locations = non_empty_or_blank(&query.locations);
    let mut plan = Vec::with_capacity(terms.len() * locations.len() * pages.max(1));
    for term in &terms {
        for location in &locations {
            for page in 0..pages.max(1) {
                plan.push(SearchRequest {
                    term: term.clone(),
                    location: location.clone(),
                    page,
                });
            }
        }
    }
    plan
}

fn non_empty_or_blank(values: &[String]) -> Vec<String> {
    let cleaned = values
        .iter()
        .map(|v| clean_whitespace(v))
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>();
    if cleaned.is_empty() {
        vec![String::new()]
    } else {
        cleaned
    }
}

/// Drive a paged HTML search: one request per planned page, stopping at `limit`.
///
/// Failed pages are skipped with a warning; postings that fail the query's
/// remote/salary filters are dropped before they count toward `limit`.
pub(crate) async fn collect_search_pages<P, Fut>(
    source_slug: &str,
    plan: Vec<SearchRequest>,
    query: &SearchQuery,
    limit: usize,
    fetch_page: P,
    parse: fn(&str) -> Result<Vec<RawPosting>, FetchError>,
) -> Result<Vec<RawPosting>, FetchError>
where
    P: Fn(SearchRequest) -> Fut,
    Fut: Future<Output = Result<String, FetchError>>,
{
    let mut out = Vec::new();
    for request in plan {
        if out.len() >= limit {
            break;
        }
        let body = match fetch_page(request.clone()).await {
            Ok(body) => body,
            Err(err) if err.is_recoverable() => {
                warn!(source_slug, term = %request.term, page = request.page, error = %err, "search page fetch failed");
                continue;
            }
            Err(err) => return Err(err),
        };
        let parsed = match parse(&body) {
            Ok(parsed) => parsed,
            Err(err) if err.is_recoverable() => {
                warn!(source_slug, error = %err, "search page parse failed");
                continue;
            }
            Err(err) => return Err(err),
        };
        let remaining = limit - out.len();
        out.extend(
            parsed
                .into_iter()
                .filter(|raw| matches_query(raw, query))
                .take(remaining),
        );
    }
    debug!(source_slug, count = out.len(), "search pages collected");
    Ok(out)
}

/// Fetch a page body through the shared fetcher.
pub(crate) async fn fetch_body(
    http: &HttpFetcher,
    source_slug: &str,
    url: &str,
    params: Vec<(&'static str, String)>,
) -> Result<String, FetchError> {
    Ok(http.fetch_text(source_slug, url, &params).await?.body)
}

pub(crate) fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Config(format!("invalid selector `{css}`: {e}")))
}

fn text_or_none(value: String) -> Option<String> {
    let cleaned = clean_whitespace(&value);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub(crate) fn element_text(el: ElementRef<'_>) -> Option<String> {
    text_or_none(el.text().collect::<Vec<_>>().join(" "))
}

pub(crate) fn select_first_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel).next().and_then(element_text)
}

pub(crate) fn select_first_attr(el: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    el.select(sel)
        .next()
        .and_then(|n| n.value().attr(attr))
        .and_then(|s| text_or_none(s.to_string()))
}

pub(crate) fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value().attr(name).and_then(|s| text_or_none(s.to_string()))
}

/// Strip markup from an HTML snippet, unescaping one level of entity-encoded
/// markup as career feeds commonly ship it.
pub(crate) fn html_to_text(snippet: &str) -> String {
    let mut text = scraper::Html::parse_fragment(snippet)
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    if text.contains('<') && text.contains('>') {
        text = scraper::Html::parse_fragment(&text)
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join(" ");
    }
    clean_whitespace(&text)
}

/// RFC 3339, naive ISO date-times (taken as UTC), or plain dates.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
