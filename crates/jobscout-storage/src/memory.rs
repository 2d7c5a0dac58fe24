use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobscout_core::{
    ApplicationRecord, ApplicationStatus, CandidateCorpusCache, IdentityKey, Posting, SourceRow,
    UpsertOutcome,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::gateway::{PersistenceGateway, StoreError};

/// Arena-style in-process store: rows live in id-keyed maps and relations are
/// plain id/slug references resolved at read time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    arena: RwLock<Arena>,
}

#[derive(Debug, Default)]
struct Arena {
    sources: BTreeMap<String, SourceRow>,
    postings: BTreeMap<i64, Posting>,
    by_identity: HashMap<IdentityKey, i64>,
    applications: BTreeMap<i64, ApplicationRecord>,
    application_by_posting: HashMap<i64, i64>,
    corpus: Option<CandidateCorpusCache>,
    next_source_id: i64,
    next_posting_id: i64,
    next_application_id: i64,
}

impl Arena {
    fn ensure_source(&mut self, slug: &str, name: &str) -> SourceRow {
        if let Some(row) = self.sources.get(slug) {
            return row.clone();
        }
        self.next_source_id += 1;
        let row = SourceRow {
            id: self.next_source_id,
            slug: slug.to_string(),
            name: name.to_string(),
        };
        self.sources.insert(slug.to_string(), row.clone());
        row
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.arena.read().await.postings.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Overwrite mutable fields, keep `id`, `source_slug`, `external_id`.
fn refresh_mutable_fields(existing: &mut Posting, incoming: Posting) {
    existing.title = incoming.title;
    existing.company = incoming.company;
    existing.location = incoming.location;
    existing.description = incoming.description;
    existing.url = incoming.url;
    existing.salary = incoming.salary;
    existing.job_type = incoming.job_type;
    existing.is_remote = incoming.is_remote;
    existing.tags = incoming.tags;
    existing.posted_at = incoming.posted_at;
    existing.scraped_at = incoming.scraped_at;
    existing.summary = incoming.summary;
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn get_or_create_source(&self, slug: &str, name: &str) -> Result<SourceRow, StoreError> {
        Ok(self.arena.write().await.ensure_source(slug, name))
    }

    async fn upsert_by_identity(&self, postings: Vec<Posting>) -> Result<UpsertOutcome, StoreError> {
        let mut outcome = UpsertOutcome::default();
        for posting in postings {
            // One lock per posting keeps each write atomic without blocking
            // readers for the whole batch.
            let mut arena = self.arena.write().await;
            if !arena.sources.contains_key(&posting.source_slug) {
                return Err(StoreError::UnknownSource(posting.source_slug));
            }
            let key = posting.identity_key();
            match arena.by_identity.get(&key).copied() {
                Some(id) => {
                    let existing = arena
                        .postings
                        .get_mut(&id)
                        .ok_or_else(|| StoreError::Corrupt(format!("dangling identity {key}")))?;
                    refresh_mutable_fields(existing, posting);
                    outcome.updated += 1;
                    outcome.saved.push(existing.clone());
                }
                None => {
                    arena.next_posting_id += 1;
                    let id = arena.next_posting_id;
                    let mut stored = posting;
                    stored.id = Some(id);
                    arena.by_identity.insert(key.clone(), id);
                    arena.postings.insert(id, stored.clone());
                    debug!(identity = %key, id, "inserted posting");
                    outcome.created += 1;
                    outcome.saved.push(stored);
                }
            }
        }
        Ok(outcome)
    }

    async fn list_all(&self) -> Result<Vec<Posting>, StoreError> {
        Ok(self.arena.read().await.postings.values().cloned().collect())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Posting>, StoreError> {
        let mut rows = self.list_all().await?;
        rows.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn get(&self, id: i64) -> Result<Option<Posting>, StoreError> {
        Ok(self.arena.read().await.postings.get(&id).cloned())
    }

    async fn count_by_source(&self) -> Result<BTreeMap<String, usize>, StoreError> {
        let arena = self.arena.read().await;
        let mut counts = BTreeMap::new();
        for posting in arena.postings.values() {
            *counts.entry(posting.source_slug.clone()).or_default() += 1;
        }
        Ok(counts)
    }

    async fn save_candidate_corpus(
        &self,
        text: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.arena.write().await.corpus = Some(CandidateCorpusCache {
            text: text.to_string(),
            updated_at,
        });
        Ok(())
    }

    async fn candidate_corpus(&self) -> Result<Option<CandidateCorpusCache>, StoreError> {
        Ok(self.arena.read().await.corpus.clone())
    }

    async fn record_application_score(
        &self,
        posting_id: i64,
        score: f64,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut arena = self.arena.write().await;
        if !arena.postings.contains_key(&posting_id) {
            return Err(StoreError::NotFound(posting_id));
        }
        let now = Utc::now();
        let app_id = match arena.application_by_posting.get(&posting_id).copied() {
            Some(id) => id,
            None => {
                arena.next_application_id += 1;
                let id = arena.next_application_id;
                arena.applications.insert(
                    id,
                    ApplicationRecord {
                        id,
                        posting_id,
                        status: ApplicationStatus::PendingReview,
                        resume_path: None,
                        cover_letter_path: None,
                        match_score: None,
                        auto_submitted: false,
                        notes: None,
                        updated_at: now,
                    },
                );
                arena.application_by_posting.insert(posting_id, id);
                id
            }
        };
        let record = arena
            .applications
            .get_mut(&app_id)
            .ok_or_else(|| StoreError::Corrupt(format!("dangling application {app_id}")))?;
        record.match_score = Some(score);
        record.updated_at = now;
        Ok(record.clone())
    }

    async fn application_for(&self, posting_id: i64) -> Result<Option<ApplicationRecord>, StoreError> {
        let arena = self.arena.read().await;
        Ok(arena
            .application_by_posting
            .get(&posting_id)
            .and_then(|id| arena.applications.get(id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};
    use std::collections::BTreeSet;

    fn posting(source: &str, external_id: &str, title: &str, day: u32) -> Posting {
        Posting {
            id: None,
            source_slug: source.into(),
            external_id: external_id.into(),
            title: title.into(),
            company: "ACME".into(),
            location: Some("Remote".into()),
            description: "Laravel APIs".into(),
            url: format!("https://example.test/{external_id}"),
            salary: None,
            job_type: None,
            is_remote: true,
            tags: BTreeSet::new(),
            posted_at: None,
            scraped_at: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            summary: None,
        }
    }

    async fn store_with_sources(slugs: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for slug in slugs {
            store.get_or_create_source(slug, &slug.to_uppercase()).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_identity() {
        let store = store_with_sources(&["indeed", "linkedin"]).await;
        let batch = vec![posting("indeed", "1", "Dev", 1), posting("linkedin", "1", "Dev", 1)];

        let first = store.upsert_by_identity(batch.clone()).await.unwrap();
        assert_eq!((first.created, first.updated), (2, 0));

        let second = store.upsert_by_identity(batch).await.unwrap();
        assert_eq!((second.created, second.updated), (0, 2));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn update_refreshes_mutable_fields_and_keeps_id() {
        let store = store_with_sources(&["indeed"]).await;
        let saved = store
            .upsert_by_identity(vec![posting("indeed", "7", "Dev", 1)])
            .await
            .unwrap()
            .saved;
        let id = saved[0].id.unwrap();

        let mut changed = posting("indeed", "7", "Senior Dev", 2);
        changed.id = Some(999);
        store.upsert_by_identity(vec![changed]).await.unwrap();

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.id, Some(id));
        assert_eq!(stored.title, "Senior Dev");
        assert_eq!(stored.scraped_at.day(), 2);
        assert!(store.get(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_recent_orders_by_scraped_at() {
        let store = store_with_sources(&["indeed"]).await;
        store
            .upsert_by_identity(vec![
                posting("indeed", "a", "A", 1),
                posting("indeed", "b", "B", 3),
                posting("indeed", "c", "C", 2),
            ])
            .await
            .unwrap();
        let recent = store.list_recent(2).await.unwrap();
        let titles = recent.iter().map(|p| p.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn sources_are_registered_once_per_slug() {
        let store = MemoryStore::new();
        let a = store.get_or_create_source("indeed", "Indeed").await.unwrap();
        let b = store.get_or_create_source("indeed", "Other").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(b.name, "Indeed");
        store.get_or_create_source("glassdoor", "Glassdoor").await.unwrap();
        store
            .upsert_by_identity(vec![posting("glassdoor", "1", "Dev", 1)])
            .await
            .unwrap();
        let counts = store.count_by_source().await.unwrap();
        assert_eq!(counts.get("glassdoor"), Some(&1));
    }

    #[tokio::test]
    async fn upsert_rejects_unregistered_source() {
        let store = store_with_sources(&["indeed"]).await;
        let err = store
            .upsert_by_identity(vec![posting("glassdoor", "1", "Dev", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownSource(slug) if slug == "glassdoor"));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn application_score_snapshot_creates_then_updates() {
        let store = store_with_sources(&["indeed"]).await;
        let id = store
            .upsert_by_identity(vec![posting("indeed", "1", "Dev", 1)])
            .await
            .unwrap()
            .saved[0]
            .id
            .unwrap();

        let first = store.record_application_score(id, 0.42).await.unwrap();
        assert_eq!(first.status, ApplicationStatus::PendingReview);
        let second = store.record_application_score(id, 0.61).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(
            store.application_for(id).await.unwrap().unwrap().match_score,
            Some(0.61)
        );

        let missing = store.record_application_score(404, 0.1).await;
        assert!(matches!(missing, Err(StoreError::NotFound(404))));
    }
}
