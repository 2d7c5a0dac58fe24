//! Discovery orchestration: configuration, concurrent fan-out, deduplication,
//! persistence and the periodic scheduler.

mod aggregator;
mod config;
mod dedup;
mod pipeline;
mod scheduler;

use std::sync::Arc;

use anyhow::{Context, Result};
use jobscout_adapters::{
    CompanyFeedAdapter, GlassdoorAdapter, IndeedAdapter, LinkedInAdapter, Normalizer, StaticJsonAdapter,
    TagService,
};
use jobscout_storage::{HttpClientConfig, HttpFetcher, MemoryStore, PersistenceGateway, PgStore};
use tracing::{info, warn};

pub use aggregator::{Aggregator, AggregatorBuilder, DiscoveryReport, SourceFailure, DEFAULT_SOURCE_TIMEOUT};
pub use config::SyncConfig;
pub use dedup::DedupEngine;
pub use pipeline::{SearchOverrides, SyncPipeline, SyncRunSummary};
pub use scheduler::Scheduler;

pub const CRATE_NAME: &str = "jobscout-sync";

/// Postgres when `DATABASE_URL` is set (migrations applied), otherwise an
/// empty in-memory store.
pub async fn build_store(config: &SyncConfig) -> Result<Arc<dyn PersistenceGateway>> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url).await.context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            info!("using postgres store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set; postings are kept in memory for this process only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub fn build_tag_service(config: &SyncConfig) -> Result<TagService> {
    let tags = TagService::default().with_keywords(config.query.job_types.iter().cloned());
    if config.tag_rules_path.exists() {
        return tags
            .with_rules_file(&config.tag_rules_path)
            .with_context(|| format!("loading tag rules from {}", config.tag_rules_path.display()));
    }
    Ok(tags)
}

/// The adapter registry is fixed here at startup: the static directory when
/// configured, otherwise the live boards plus company feeds.
pub fn build_aggregator(config: &SyncConfig) -> Result<Aggregator> {
    let normalizer = Normalizer::new(build_tag_service(config)?);
    let mut builder = Aggregator::builder()
        .timeout(config.source_timeout)
        .normalizer(normalizer);

    if let Some(dir) = &config.static_jobs_dir {
        for adapter in StaticJsonAdapter::discover_dir(dir)? {
            builder = builder.adapter(adapter);
        }
        return Ok(builder.build());
    }

    let http = Arc::new(HttpFetcher::new(HttpClientConfig {
        timeout: config.board_timeout,
        user_agent: Some(config.user_agent.clone()),
        ..HttpClientConfig::default()
    })?);
    builder = builder
        .adapter(LinkedInAdapter::new(Arc::clone(&http), config.linkedin_pages))
        .adapter(IndeedAdapter::new(Arc::clone(&http), config.indeed_pages))
        .adapter(GlassdoorAdapter::new(Arc::clone(&http), config.glassdoor_pages));
    if !config.company_feeds.is_empty() {
        builder = builder.adapter(CompanyFeedAdapter::new(http, config.company_feeds.clone()));
    }
    Ok(builder.build())
}

pub async fn build_pipeline(config: &SyncConfig) -> Result<SyncPipeline> {
    let aggregator = build_aggregator(config)?;
    let store = build_store(config).await?;
    Ok(SyncPipeline::new(
        aggregator,
        store,
        config.query.clone(),
        config.per_source_limit,
    ))
}
