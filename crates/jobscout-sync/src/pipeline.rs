use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jobscout_core::SearchQuery;
use jobscout_storage::PersistenceGateway;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::aggregator::{Aggregator, SourceFailure};
use crate::dedup::DedupEngine;

/// Optional per-call overrides of the configured search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOverrides {
    #[serde(default)]
    pub terms: Option<Vec<String>>,
    #[serde(default)]
    pub locations: Option<Vec<String>>,
    #[serde(default)]
    pub job_types: Option<Vec<String>>,
    #[serde(default)]
    pub remote_only: Option<bool>,
    #[serde(default)]
    pub salary_min: Option<u32>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchOverrides {
    pub fn apply(&self, base: &SearchQuery, base_limit: usize) -> (SearchQuery, usize) {
        let query = SearchQuery {
            terms: self.terms.clone().unwrap_or_else(|| base.terms.clone()),
            locations: self.locations.clone().unwrap_or_else(|| base.locations.clone()),
            job_types: self.job_types.clone().unwrap_or_else(|| base.job_types.clone()),
            remote_only: self.remote_only.unwrap_or(base.remote_only),
            salary_min: self.salary_min.or(base.salary_min),
        };
        (query, self.limit.unwrap_or(base_limit))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Adapters the discovery call fanned out to.
    pub sources: usize,
    pub fetched: usize,
    pub deduplicated: usize,
    pub created: usize,
    pub updated: usize,
    pub failed_sources: Vec<SourceFailure>,
}

/// discover -> dedupe -> upsert. All fetching finishes before the first write.
pub struct SyncPipeline {
    aggregator: Aggregator,
    dedup: DedupEngine,
    store: Arc<dyn PersistenceGateway>,
    query: SearchQuery,
    per_source_limit: usize,
}

impl SyncPipeline {
    pub fn new(
        aggregator: Aggregator,
        store: Arc<dyn PersistenceGateway>,
        query: SearchQuery,
        per_source_limit: usize,
    ) -> Self {
        Self {
            aggregator,
            dedup: DedupEngine::new(),
            store,
            query,
            per_source_limit,
        }
    }

    pub fn store(&self) -> Arc<dyn PersistenceGateway> {
        Arc::clone(&self.store)
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub async fn run_once(&self) -> Result<SyncRunSummary> {
        self.run_with(&SearchOverrides::default()).await
    }

    pub async fn run_with(&self, overrides: &SearchOverrides) -> Result<SyncRunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync_run", %run_id);
        async {
            let started_at = Utc::now();
            let (query, limit) = overrides.apply(&self.query, self.per_source_limit);

            let report = self.aggregator.discover(&query, limit).await;
            let fetched = report.postings.len();

            for source in &report.contributing {
                self.store
                    .get_or_create_source(&source.slug, &source.name)
                    .await
                    .with_context(|| format!("registering source {}", source.slug))?;
            }

            let unique = self.dedup.dedupe(report.postings);
            let deduplicated = unique.len();
            let outcome = self
                .store
                .upsert_by_identity(unique)
                .await
                .context("upserting postings")?;

            let summary = SyncRunSummary {
                run_id,
                started_at,
                finished_at: Utc::now(),
                sources: self.aggregator.sources().len(),
                fetched,
                deduplicated,
                created: outcome.created,
                updated: outcome.updated,
                failed_sources: report.failures,
            };
            info!(
                fetched = summary.fetched,
                deduplicated = summary.deduplicated,
                created = summary.created,
                updated = summary.updated,
                failed_sources = summary.failed_sources.len(),
                "sync run finished"
            );
            Ok::<_, anyhow::Error>(summary)
        }
        .instrument(span)
        .await
    }
}
