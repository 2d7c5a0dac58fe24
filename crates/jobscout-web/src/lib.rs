//! JSON API over the discovery pipeline and the match query.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use jobscout_core::{MatchResult, Posting};
use jobscout_match::{MatchError, MatchService, ScoredApplication};
use jobscout_storage::{PersistenceGateway, StoreError};
use jobscout_sync::{SearchOverrides, SyncPipeline, SyncRunSummary};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

pub const CRATE_NAME: &str = "jobscout-web";

const DEFAULT_MATCH_LIMIT: usize = 25;
const DEFAULT_POSTINGS_LIMIT: usize = 50;
const MAX_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SyncPipeline>,
    pub matches: Arc<MatchService>,
}

impl AppState {
    pub fn new(pipeline: Arc<SyncPipeline>, matches: Arc<MatchService>) -> Self {
        Self { pipeline, matches }
    }

    fn store(&self) -> Arc<dyn PersistenceGateway> {
        self.pipeline.store()
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            WebError::Match(MatchError::ProfileMissing) => (StatusCode::UNPROCESSABLE_ENTITY, "PROFILE_MISSING"),
            WebError::Match(MatchError::JobNotFound(_)) | WebError::Store(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            WebError::Match(MatchError::ProfileLoad { .. }) => {
                error!(error = %self, "profile could not be loaded");
                (StatusCode::INTERNAL_SERVER_ERROR, "PROFILE_UNREADABLE")
            }
            _ => {
                error!(error = ?self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize, Default)]
struct LimitQuery {
    limit: Option<usize>,
}

/// One ranked posting: the posting's own fields plus its scores.
#[derive(Debug, Serialize)]
pub struct MatchView {
    #[serde(flatten)]
    pub posting: Posting,
    pub score: f64,
    pub similarity: f64,
    pub recency_bonus: f64,
}

impl From<MatchResult> for MatchView {
    fn from(result: MatchResult) -> Self {
        Self {
            posting: result.posting,
            score: result.score,
            similarity: result.similarity,
            recency_bonus: result.recency_bonus,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/discover", post(discover_handler))
        .route("/matches", get(matches_handler))
        .route("/postings", get(postings_handler))
        .route("/postings/{id}/score", post(score_posting_handler))
        .route("/sources", get(sources_handler))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "serving JobScout API");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn discover_handler(
    State(state): State<AppState>,
    overrides: Option<Json<SearchOverrides>>,
) -> Result<Json<SyncRunSummary>, WebError> {
    let overrides = overrides.map(|Json(o)| o).unwrap_or_default();
    Ok(Json(state.pipeline.run_with(&overrides).await?))
}

async fn matches_handler(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<MatchView>>, WebError> {
    let limit = query.limit.unwrap_or(DEFAULT_MATCH_LIMIT).clamp(1, MAX_LIMIT);
    let ranked = state.matches.matches(limit).await?;
    Ok(Json(ranked.into_iter().map(MatchView::from).collect()))
}

async fn postings_handler(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Posting>>, WebError> {
    let limit = query.limit.unwrap_or(DEFAULT_POSTINGS_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(state.store().list_recent(limit).await?))
}

async fn score_posting_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ScoredApplication>, WebError> {
    Ok(Json(state.matches.score_posting(id).await?))
}

async fn sources_handler(State(state): State<AppState>) -> Result<Json<BTreeMap<String, usize>>, WebError> {
    Ok(Json(state.store().count_by_source().await?))
}
