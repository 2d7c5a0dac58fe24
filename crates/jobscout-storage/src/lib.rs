//! HTTP fetch utilities and the persistence gateway for JobScout.

mod gateway;
mod memory;
mod postgres;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info_span, Instrument};

pub use gateway::{PersistenceGateway, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const CRATE_NAME: &str = "jobscout-storage";

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    pub per_source_concurrency: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            global_concurrency: 16,
            per_source_concurrency: 2,
        }
    }
}

/// Shared HTTP client with global and per-source concurrency limits.
///
/// Issues exactly one request per call; failed fetches are not retried within a
/// discovery cycle.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    global_limit: Arc<Semaphore>,
    per_source_limit: usize,
    per_source: Mutex<HashMap<String, Arc<Semaphore>>>,
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: String,
}

/// Recoverable and contract failures raised while fetching one source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("{source_slug} timed out after {after:?}")]
    Timeout { source_slug: String, after: Duration },
    #[error("unparsable response from {source_slug}: {message}")]
    Parse { source_slug: String, message: String },
    #[error("invalid adapter configuration: {0}")]
    Config(String),
}

impl FetchError {
    /// Configuration errors are programming-contract violations; everything else
    /// reduces a source's contribution to zero postings.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FetchError::Config(_))
    }
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;

        Ok(Self {
            client,
            timeout: config.timeout,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            per_source_limit: config.per_source_concurrency.max(1),
            per_source: Mutex::new(HashMap::new()),
        })
    }

    async fn per_source_semaphore(&self, source_slug: &str) -> Arc<Semaphore> {
        let mut map = self.per_source.lock().await;
        map.entry(source_slug.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_source_limit)))
            .clone()
    }

    pub async fn fetch_text(
        &self,
        source_slug: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<FetchedResponse, FetchError> {
        let _global = self
            .global_limit
            .acquire()
            .await
            .expect("semaphore not closed");
        let per_source = self.per_source_semaphore(source_slug).await;
        let _source = per_source.acquire().await.expect("semaphore not closed");

        let span = info_span!("http_fetch", source_slug, url);
        async {
            let resp = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .query(query)
                .send()
                .await
                .map_err(|err| self.classify(source_slug, err))?;

            let status = resp.status();
            let final_url = resp.url().to_string();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            let body = resp.text().await.map_err(|err| self.classify(source_slug, err))?;
            debug!(status = status.as_u16(), bytes = body.len(), "fetched");
            Ok(FetchedResponse {
                status,
                final_url,
                body,
            })
        }
        .instrument(span)
        .await
    }

    fn classify(&self, source_slug: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                source_slug: source_slug.to_string(),
                after: self.timeout,
            }
        } else {
            FetchError::Request(err)
        }
    }
}
