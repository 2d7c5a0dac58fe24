use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobscout_core::{
    ApplicationRecord, ApplicationStatus, CandidateCorpusCache, Posting, SourceRow, UpsertOutcome,
};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, warn};

use crate::gateway::{PersistenceGateway, StoreError};

const POSTING_COLUMNS: &str = "id, source_slug, external_id, title, company, location, description, \
     url, salary, job_type, is_remote, tags, posted_at, scraped_at, summary";

const APPLICATION_COLUMNS: &str =
    "id, posting_id, status, resume_path, cover_letter_path, match_score, auto_submitted, notes, updated_at";

/// Postgres-backed gateway. Each posting is written in its own transaction.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn upsert_one(&self, posting: &Posting) -> Result<(Posting, bool), StoreError> {
        let mut tx = self.pool.begin().await?;
        let registered = sqlx::query("SELECT 1 FROM sources WHERE slug = $1")
            .bind(&posting.source_slug)
            .fetch_optional(&mut *tx)
            .await?;
        if registered.is_none() {
            return Err(StoreError::UnknownSource(posting.source_slug.clone()));
        }

        if let Some(row) = update_posting(&mut tx, posting).await? {
            let saved = row_to_posting(&row)?;
            tx.commit().await?;
            return Ok((saved, false));
        }

        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO postings
                (source_slug, external_id, title, company, location, description, url,
                 salary, job_type, is_remote, tags, posted_at, scraped_at, summary)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {POSTING_COLUMNS}
            "#
        ))
        .bind(&posting.source_slug)
        .bind(&posting.external_id)
        .bind(&posting.title)
        .bind(&posting.company)
        .bind(&posting.location)
        .bind(&posting.description)
        .bind(&posting.url)
        .bind(&posting.salary)
        .bind(&posting.job_type)
        .bind(posting.is_remote)
        .bind(tags_json(&posting.tags))
        .bind(posting.posted_at)
        .bind(posting.scraped_at)
        .bind(&posting.summary)
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(row) => {
                let saved = row_to_posting(&row)?;
                tx.commit().await?;
                Ok((saved, true))
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Conflict(posting.identity_key()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

async fn update_posting(
    tx: &mut Transaction<'_, Postgres>,
    posting: &Posting,
) -> Result<Option<PgRow>, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE postings
           SET title = $3,
               company = $4,
               location = $5,
               description = $6,
               url = $7,
               salary = $8,
               job_type = $9,
               is_remote = $10,
               tags = $11,
               posted_at = $12,
               scraped_at = $13,
               summary = $14
         WHERE source_slug = $1
           AND external_id = $2
        RETURNING {POSTING_COLUMNS}
        "#
    ))
    .bind(&posting.source_slug)
    .bind(&posting.external_id)
    .bind(&posting.title)
    .bind(&posting.company)
    .bind(&posting.location)
    .bind(&posting.description)
    .bind(&posting.url)
    .bind(&posting.salary)
    .bind(&posting.job_type)
    .bind(posting.is_remote)
    .bind(tags_json(&posting.tags))
    .bind(posting.posted_at)
    .bind(posting.scraped_at)
    .bind(&posting.summary)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row)
}

fn tags_json(tags: &BTreeSet<String>) -> JsonValue {
    JsonValue::Array(tags.iter().cloned().map(JsonValue::String).collect())
}

fn row_to_posting(row: &PgRow) -> Result<Posting, StoreError> {
    let tags: JsonValue = row.try_get("tags")?;
    let tags = tags
        .as_array()
        .ok_or_else(|| StoreError::Corrupt("postings.tags is not an array".into()))?
        .iter()
        .filter_map(|v| v.as_str().map(ToString::to_string))
        .collect();
    Ok(Posting {
        id: Some(row.try_get("id")?),
        source_slug: row.try_get("source_slug")?,
        external_id: row.try_get("external_id")?,
        title: row.try_get("title")?,
        company: row.try_get("company")?,
        location: row.try_get("location")?,
        description: row.try_get("description")?,
        url: row.try_get("url")?,
        salary: row.try_get("salary")?,
        job_type: row.try_get("job_type")?,
        is_remote: row.try_get("is_remote")?,
        tags,
        posted_at: row.try_get("posted_at")?,
        scraped_at: row.try_get("scraped_at")?,
        summary: row.try_get("summary")?,
    })
}

fn row_to_application(row: &PgRow) -> Result<ApplicationRecord, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(ApplicationRecord {
        id: row.try_get("id")?,
        posting_id: row.try_get("posting_id")?,
        status: ApplicationStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown application status {status}")))?,
        resume_path: row.try_get("resume_path")?,
        cover_letter_path: row.try_get("cover_letter_path")?,
        match_score: row.try_get("match_score")?,
        auto_submitted: row.try_get("auto_submitted")?,
        notes: row.try_get("notes")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PersistenceGateway for PgStore {
    async fn get_or_create_source(&self, slug: &str, name: &str) -> Result<SourceRow, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO sources (slug, name) VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING id, slug, name
            "#,
        )
        .bind(slug)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(SourceRow {
            id: row.try_get("id")?,
            slug: row.try_get("slug")?,
            name: row.try_get("name")?,
        })
    }

    async fn upsert_by_identity(&self, postings: Vec<Posting>) -> Result<UpsertOutcome, StoreError> {
        let mut outcome = UpsertOutcome::default();
        for posting in &postings {
            match self.upsert_one(posting).await {
                Ok((saved, true)) => {
                    outcome.created += 1;
                    outcome.saved.push(saved);
                }
                Ok((saved, false)) => {
                    outcome.updated += 1;
                    outcome.saved.push(saved);
                }
                Err(StoreError::Conflict(key)) => {
                    debug!(identity = %key, "identity race on insert; skipping");
                }
                Err(err) => {
                    warn!(identity = %posting.identity_key(), error = %err, "posting upsert failed");
                    return Err(err);
                }
            }
        }
        Ok(outcome)
    }

    async fn list_all(&self) -> Result<Vec<Posting>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {POSTING_COLUMNS} FROM postings ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_posting).collect()
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Posting>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {POSTING_COLUMNS} FROM postings ORDER BY scraped_at DESC, id DESC LIMIT $1"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_posting).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Posting>, StoreError> {
        let row = sqlx::query(&format!("SELECT {POSTING_COLUMNS} FROM postings WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_posting).transpose()
    }

    async fn count_by_source(&self) -> Result<BTreeMap<String, usize>, StoreError> {
        let rows = sqlx::query(
            "SELECT source_slug, COUNT(*) AS n FROM postings GROUP BY source_slug ORDER BY source_slug",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut out = BTreeMap::new();
        for row in rows {
            let n: i64 = row.try_get("n")?;
            out.insert(row.try_get("source_slug")?, usize::try_from(n).unwrap_or_default());
        }
        Ok(out)
    }

    async fn save_candidate_corpus(
        &self,
        text: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO candidate_corpus_cache (id, text, updated_at) VALUES (1, $1, $2)
            ON CONFLICT (id) DO UPDATE SET text = EXCLUDED.text, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(text)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn candidate_corpus(&self) -> Result<Option<CandidateCorpusCache>, StoreError> {
        let row = sqlx::query("SELECT text, updated_at FROM candidate_corpus_cache WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(CandidateCorpusCache {
                text: row.try_get("text")?,
                updated_at: row.try_get("updated_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn record_application_score(
        &self,
        posting_id: i64,
        score: f64,
    ) -> Result<ApplicationRecord, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM postings WHERE id = $1)")
            .bind(posting_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(StoreError::NotFound(posting_id));
        }
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO applications (posting_id, status, match_score, updated_at)
            VALUES ($1, 'pending_review', $2, NOW())
            ON CONFLICT (posting_id) DO UPDATE
                SET match_score = EXCLUDED.match_score,
                    updated_at = NOW()
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(posting_id)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;
        row_to_application(&row)
    }

    async fn application_for(&self, posting_id: i64) -> Result<Option<ApplicationRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE posting_id = $1"
        ))
        .bind(posting_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_application).transpose()
    }
}
