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

const SEARCH_URL: &str = "https://www.glassdoor.com/Job/jobs.htm";
const SITE_ROOT: &str = "https://www.glassdoor.com";

#[derive(Debug, Clone)]
pub struct GlassdoorAdapter {
    http: Arc<HttpFetcher>,
    pages: usize,
    base_url: String,
}

impl GlassdoorAdapter {
    pub const SLUG: &'static str = "glassdoor";

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
impl SourceAdapter for GlassdoorAdapter {
    fn source(&self) -> SourceInfo {
        SourceInfo::new(Self::SLUG, "Glassdoor")
    }

    async fn fetch(&self, query: &SearchQuery, limit: usize) -> Result<Vec<RawPosting>, FetchError> {
        let span = info_span!("adapter_fetch", source_slug = Self::SLUG, limit);
        collect_search_pages(
            Self::SLUG,
            search_plan(query, self.pages),
            query,
            limit,
            |request| {
                // Glassdoor pages are 1-based.
                let params = vec![
                    ("keyword", request.term),
                    ("locT", "C".to_string()),
                    ("locId", "-1".to_string()),
                    ("locKeyword", request.location),
                    ("p", (request.page + 1).to_string()),
                ];
                fetch_body(&self.http, Self::SLUG, &self.base_url, params)
            },
            parse_glassdoor_results,
        )
        .instrument(span)
        .await
    }
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{SITE_ROOT}{href}")
    }
}

pub fn parse_glassdoor_results(html: &str) -> Result<Vec<RawPosting>, FetchError> {
    let card_sel = selector("li.react-job-listing")?;
    let title_sel = selector("a.jobLink span")?;
    let link_sel = selector("a.jobLink")?;
    let company_sel = selector("div.d-flex div")?;
    let location_sel = selector("span.pr-xxsm")?;
    let salary_sel = selector("div.salary-estimate")?;
    let snippet_sel = selector("div.job-snippet")?;

    let document = Html::parse_document(html);
    let mut out = Vec::new();
    for card in document.select(&card_sel) {
        let Some(job_id) = attr(card, "data-id").or_else(|| attr(card, "data-job-id")) else {
            continue;
        };
        let summary = select_first_text(card, &snippet_sel);
        out.push(RawPosting {
            external_id: job_id,
            title: select_first_text(card, &title_sel)
                .or_else(|| select_first_text(card, &link_sel))
                .unwrap_or_default(),
            company: select_first_text(card, &company_sel).unwrap_or_default(),
            location: select_first_text(card, &location_sel),
            description: summary.clone().unwrap_or_default(),
            url: select_first_attr(card, &link_sel, "href")
                .map(|href| absolute_url(&href))
                .unwrap_or_default(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_links_are_made_absolute() {
        assert_eq!(
            absolute_url("/partner/jobListing.htm?jobListingId=9"),
            "https://www.glassdoor.com/partner/jobListing.htm?jobListingId=9"
        );
        assert_eq!(absolute_url("https://example.test/x"), "https://example.test/x");
    }
}
