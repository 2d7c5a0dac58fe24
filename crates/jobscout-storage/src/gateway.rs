use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobscout_core::{
    ApplicationRecord, CandidateCorpusCache, IdentityKey, Posting, SourceRow, UpsertOutcome,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer inserted the same identity key first.
    #[error("identity key {0} already exists")]
    Conflict(IdentityKey),
    #[error("posting {0} not found")]
    NotFound(i64),
    /// Postings may only be written for a source registered with `get_or_create_source`.
    #[error("source {0} is not registered")]
    UnknownSource(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage contract the pipeline and scoring engine depend on.
///
/// Postings are keyed by `(source_slug, external_id)`; sources by slug. Every
/// write is atomic per posting, so an abandoned cycle never leaves a partially
/// written posting behind.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn get_or_create_source(&self, slug: &str, name: &str) -> Result<SourceRow, StoreError>;

    /// Insert-or-update by identity key. Identity fields of existing rows are
    /// never changed; integrity races are skipped rather than surfaced.
    async fn upsert_by_identity(&self, postings: Vec<Posting>) -> Result<UpsertOutcome, StoreError>;

    async fn list_all(&self) -> Result<Vec<Posting>, StoreError>;

    /// Most recently scraped first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Posting>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Posting>, StoreError>;

    async fn count_by_source(&self) -> Result<BTreeMap<String, usize>, StoreError>;

    async fn save_candidate_corpus(
        &self,
        text: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn candidate_corpus(&self) -> Result<Option<CandidateCorpusCache>, StoreError>;

    /// Write a score snapshot onto the posting's application, creating a
    /// `pending_review` application when none exists.
    async fn record_application_score(
        &self,
        posting_id: i64,
        score: f64,
    ) -> Result<ApplicationRecord, StoreError>;

    async fn application_for(&self, posting_id: i64) -> Result<Option<ApplicationRecord>, StoreError>;
}
