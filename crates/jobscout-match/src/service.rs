use std::sync::Arc;

use chrono::Utc;
use jobscout_core::{ApplicationRecord, CandidateProfile, MatchResult};
use jobscout_storage::{PersistenceGateway, StoreError};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::ScoringEngine;
use crate::profile::ProfileLoader;
use crate::MatchError;

/// Score of one stored posting, written onto its application.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredApplication {
    pub result: MatchResult,
    pub application: ApplicationRecord,
}

/// Match queries over the stored postings.
pub struct MatchService {
    store: Arc<dyn PersistenceGateway>,
    engine: ScoringEngine,
    profiles: ProfileLoader,
}

impl MatchService {
    pub fn new(store: Arc<dyn PersistenceGateway>, engine: ScoringEngine, profiles: ProfileLoader) -> Self {
        Self {
            store,
            engine,
            profiles,
        }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Loads the profile and caches its corpus. Fails with `ProfileMissing`
    /// when there is nothing to score against.
    pub async fn candidate(&self) -> Result<CandidateProfile, MatchError> {
        let profile = self.profiles.load().await?;
        if profile.is_empty() {
            return Err(MatchError::ProfileMissing);
        }
        if let Err(err) = self.store.save_candidate_corpus(&profile.corpus, Utc::now()).await {
            warn!(error = %err, "could not cache candidate corpus");
        }
        Ok(profile)
    }

    /// Best matches across every stored posting.
    pub async fn matches(&self, limit: usize) -> Result<Vec<MatchResult>, MatchError> {
        let profile = self.candidate().await?;
        let postings = self.store.list_all().await?;
        let total = postings.len();
        let ranked = self.engine.rank(&profile.corpus, postings, limit, Utc::now())?;
        info!(total, returned = ranked.len(), "match query ranked postings");
        Ok(ranked)
    }

    /// Score a single stored posting against the profile and snapshot the score
    /// onto its application, creating one in `pending_review` when needed.
    pub async fn score_posting(&self, posting_id: i64) -> Result<ScoredApplication, MatchError> {
        let profile = self.candidate().await?;
        let posting = self
            .store
            .get(posting_id)
            .await?
            .ok_or(MatchError::JobNotFound(posting_id))?;
        let result = self
            .engine
            .score(&profile.corpus, vec![posting], Utc::now())?
            .pop()
            .ok_or(MatchError::JobNotFound(posting_id))?;
        let application = self
            .store
            .record_application_score(posting_id, result.score)
            .await
            .map_err(|err| match err {
                StoreError::NotFound(id) => MatchError::JobNotFound(id),
                other => MatchError::Store(other),
            })?;
        info!(posting_id, score = result.score, "recorded application score");
        Ok(ScoredApplication { result, application })
    }
}
