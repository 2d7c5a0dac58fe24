use std::sync::Arc;

use async_trait::async_trait;
use jobscout_core::{RawPosting, SearchQuery, SourceInfo};
use jobscout_storage::HttpFetcher;
use scraper::Html;
use tracing::{info_span, Instrument};

use crate::{
    attr, collect_search_pages, fetch_body, search_plan, select_first_attr, select_first_text,
    selector, FetchError, SourceAdapter,
};

const SEARCH_URL: &str = "https://www.indeed.com/jobs";
const VIEW_URL: &str = "https://www.indeed.com/viewjob?jk=";
const PAGE_SIZE: usize = 10;
/// Only postings from the last week.
const MAX_AGE_DAYS: &str = "7";

#[derive(Debug, Clone)]
pub struct IndeedAdapter {
    http: Arc<HttpFetcher>,
    pages: usize,
    base_url: String,
}

impl IndeedAdapter {
    pub const SLUG: &'static str = "indeed";

    pub fn new(http: Arc<HttpFetcher>, pages: usize) -> Self {
        Self {
            http,
            pages: pages.max(1),
            base_url: SEARCH_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceAdapter for IndeedAdapter {
    fn source(&self) -> SourceInfo {
        SourceInfo::new(Self::SLUG, "Indeed")
    }

    async fn fetch(&self, query: &SearchQuery, limit: usize) -> Result<Vec<RawPosting>, FetchError> {
        let span = info_span!("adapter_fetch", source_slug = Self::SLUG, limit);
        collect_search_pages(
            Self::SLUG,
            search_plan(query, self.pages),
            query,
            limit,
            |request| {
                let params = vec![
                    ("q", request.term),
                    ("l", request.location),
                    ("start", (request.page * PAGE_SIZE).to_string()),
                    ("fromage", MAX_AGE_DAYS.to_string()),
                ];
                fetch_body(&self.http, Self::SLUG, &self.base_url, params)
            },
            parse_indeed_results,
        )
        .instrument(span)
        .await
    }
}

fn job_key_from_href(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("jk=")?;
    let key = rest.split('&').next().unwrap_or_default().trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Parse a results page. Accepts both the `.resultContent` layout and the
/// older `a.tapItem` cards.
pub fn parse_indeed_results(html: &str) -> Result<Vec<RawPosting>, FetchError> {
    let result_sel = selector(".resultContent")?;
    let tap_sel = selector("a.tapItem")?;
    let keyed_sel = selector("[data-jk]")?;
    let href_sel = selector("a[href]")?;
    let title_sel = selector("h2.jobTitle span")?;
    let title_fallback_sel = selector("span[title]")?;
    let company_sel = selector("span.companyName")?;
    let location_sel = selector("div.companyLocation")?;
    let snippet_sel = selector("div.job-snippet")?;
    let salary_sel = selector("div.salary-snippet")?;

    let document = Html::parse_document(html);
    let mut cards = document.select(&result_sel).collect::<Vec<_>>();
    if cards.is_empty() {
        cards = document.select(&tap_sel).collect();
    }

    let mut out = Vec::new();
    for card in cards {
        let job_id = attr(card, "data-jk")
            .or_else(|| attr(card, "data-mobtk"))
            .or_else(|| select_first_attr(card, &keyed_sel, "data-jk"))
            .or_else(|| attr(card, "href").as_deref().and_then(job_key_from_href))
            .or_else(|| {
                card.select(&href_sel)
                    .filter_map(|a| a.value().attr("href"))
                    .find_map(job_key_from_href)
            });
        let Some(job_id) = job_id else {
            continue;
        };
        let summary = select_first_text(card, &snippet_sel);
        out.push(RawPosting {
            url: format!("{VIEW_URL}{job_id}"),
            external_id: job_id,
            title: select_first_text(card, &title_sel)
                .or_else(|| select_first_text(card, &title_fallback_sel))
                .unwrap_or_default(),
            company: select_first_text(card, &company_sel).unwrap_or_default(),
            location: select_first_text(card, &location_sel),
            description: summary.clone().unwrap_or_default(),
            salary: select_first_text(card, &salary_sel),
            job_type: None,
            is_remote: summary
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains("remote")),
            posted_at: None,
            tags: Vec::new(),
            summary,
        });
    }
    Ok(out)
}
