//! Relevance scoring of stored postings against the candidate profile.

mod engine;
mod profile;
mod service;
pub mod tfidf;

use std::path::PathBuf;

use jobscout_storage::StoreError;
use thiserror::Error;

pub use engine::{ScoringConfig, ScoringEngine};
pub use profile::ProfileLoader;
pub use service::{MatchService, ScoredApplication};

pub const CRATE_NAME: &str = "jobscout-match";

#[derive(Debug, Error)]
pub enum MatchError {
    /// No resume text and no profile text to score against.
    #[error("candidate profile is empty; add a resume or profile before matching")]
    ProfileMissing,
    #[error("posting {0} not found")]
    JobNotFound(i64),
    #[error("reading profile {}: {message}", .path.display())]
    ProfileLoad { path: PathBuf, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}
