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

const SEARCH_URL: &str = "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";
const PAGE_SIZE: usize = 25;

/// LinkedIn's public guest search endpoint, which returns `<li>` card fragments.
#[derive(Debug, Clone)]
pub struct LinkedInAdapter {
    http: Arc<HttpFetcher>,
    pages: usize,
    base_url: String,
}

impl LinkedInAdapter {
    pub const SLUG: &'static str = "linkedin";

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
impl SourceAdapter for LinkedInAdapter {
    fn source(&self) -> SourceInfo {
        SourceInfo::new(Self::SLUG, "LinkedIn")
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
                    ("keywords", request.term),
                    ("location", request.location),
                    ("start", (request.page * PAGE_SIZE).to_string()),
                ];
                fetch_body(&self.http, Self::SLUG, &self.base_url, params)
            },
            parse_linkedin_results,
        )
        .instrument(span)
        .await
    }
}

/// Parse a guest-search fragment. Cards without a job id are skipped.
pub fn parse_linkedin_results(html: &str) -> Result<Vec<RawPosting>, FetchError> {
    let card_sel = selector("li")?;
    let urn_sel = selector("[data-entity-urn]")?;
    let title_sel = selector("h3.base-search-card__title")?;
    let company_sel = selector("h4.base-search-card__subtitle")?;
    let location_sel = selector("span.job-search-card__location")?;
    let snippet_sel = selector("p.job-search-card__snippet")?;
    let link_sel = selector("a.base-card__full-link")?;
    let date_sel = selector("time[datetime]")?;

    let document = Html::parse_document(html);
    let mut out = Vec::new();
    for card in document.select(&card_sel) {
        let job_id = attr(card, "data-id")
            .or_else(|| attr(card, "data-entity-urn"))
            .or_else(|| select_first_attr(card, &urn_sel, "data-entity-urn"));
        let Some(job_id) = job_id else {
            continue;
        };
        let external_id = job_id.rsplit(':').next().unwrap_or(&job_id).to_string();
        let summary = select_first_text(card, &snippet_sel);
        let url = select_first_attr(card, &link_sel, "href")
            .map(|href| href.split('?').next().unwrap_or_default().to_string())
            .unwrap_or_default();
        out.push(RawPosting {
            external_id,
            title: select_first_text(card, &title_sel).unwrap_or_default(),
            company: select_first_text(card, &company_sel).unwrap_or_default(),
            location: select_first_text(card, &location_sel),
            description: summary.clone().unwrap_or_default(),
            url,
            salary: None,
            job_type: None,
            is_remote: summary
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains("remote")),
            posted_at: select_first_attr(card, &date_sel, "datetime")
                .as_deref()
                .and_then(crate::parse_timestamp),
            tags: Vec::new(),
            summary,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobscout_storage::HttpClientConfig;
    use std::time::Duration;

    #[test]
    fn cards_without_ids_are_skipped() {
        let html = r#"<ul>
            <li><h3 class="base-search-card__title">No id</h3></li>
            <li data-id="77"><h3 class="base-search-card__title">PHP Dev</h3></li>
        </ul>"#;
        let parsed = parse_linkedin_results(html).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].external_id, "77");
        assert_eq!(parsed[0].title, "PHP Dev");
        assert_eq!(parsed[0].company, "");
    }

    #[tokio::test]
    async fn unreachable_board_yields_empty_result() {
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        let adapter = LinkedInAdapter::new(Arc::new(http), 1).with_base_url("http://127.0.0.1:9/search");
        let postings = adapter.fetch(&SearchQuery::default(), 10).await.unwrap();
        assert!(postings.is_empty());
    }
}
