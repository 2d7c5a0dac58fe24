use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jobscout_adapters::{Normalizer, SourceAdapter};
use jobscout_core::{Posting, SearchQuery, SourceInfo};
use serde::Serialize;
use tracing::{info, warn};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(60);

/// Why one source contributed nothing to a discovery call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source_slug: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub postings: Vec<Posting>,
    /// Sources that returned at least one posting.
    pub contributing: Vec<SourceInfo>,
    pub failures: Vec<SourceFailure>,
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Fans a query out to every registered adapter at once and merges whatever
/// came back. A failing, panicking or slow adapter only loses its own postings.
pub struct Aggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    timeout: Duration,
    normalizer: Arc<Normalizer>,
}

#[derive(Default)]
pub struct AggregatorBuilder {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    timeout: Option<Duration>,
    normalizer: Option<Normalizer>,
}

impl AggregatorBuilder {
    pub fn adapter(mut self, adapter: impl SourceAdapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    pub fn shared_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Upper bound on one adapter's whole `fetch`, all of its pages included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn build(self) -> Aggregator {
        Aggregator {
            adapters: self.adapters,
            timeout: self.timeout.unwrap_or(DEFAULT_SOURCE_TIMEOUT),
            normalizer: Arc::new(self.normalizer.unwrap_or_default()),
        }
    }
}

impl Aggregator {
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::default()
    }

    pub fn sources(&self) -> Vec<SourceInfo> {
        self.adapters.iter().map(|a| a.source()).collect()
    }

    pub async fn discover(&self, query: &SearchQuery, per_source_limit: usize) -> DiscoveryReport {
        let scraped_at = Utc::now();
        let mut sources = Vec::with_capacity(self.adapters.len());
        let mut tasks = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let query = query.clone();
            let timeout = self.timeout;
            sources.push(adapter.source());
            tasks.push(tokio::spawn(async move {
                tokio::time::timeout(timeout, adapter.fetch(&query, per_source_limit)).await
            }));
        }

        let mut report = DiscoveryReport {
            scraped_at: Some(scraped_at),
            ..Default::default()
        };
        // Every task is already running; awaiting in registry order only fixes the report order.
        for (source, task) in sources.into_iter().zip(tasks) {
            let reason = match task.await {
                Ok(Ok(Ok(raws))) => {
                    let before = report.postings.len();
                    report.postings.extend(
                        raws.into_iter()
                            .take(per_source_limit)
                            .map(|raw| self.normalizer.normalize(&source.slug, raw, scraped_at)),
                    );
                    let count = report.postings.len() - before;
                    info!(source_slug = %source.slug, count, "source fetched");
                    if count > 0 {
                        report.contributing.push(source);
                    }
                    continue;
                }
                Ok(Ok(Err(err))) => err.to_string(),
                Ok(Err(_elapsed)) => format!("timed out after {:?}", self.timeout),
                Err(join_err) if join_err.is_panic() => "adapter panicked".to_string(),
                Err(join_err) => join_err.to_string(),
            };
            warn!(source_slug = %source.slug, reason = %reason, "source failed; continuing without it");
            report.failures.push(SourceFailure {
                source_slug: source.slug,
                reason,
            });
        }
        report
    }
}
