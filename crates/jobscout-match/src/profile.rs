use std::path::{Path, PathBuf};

use jobscout_core::CandidateProfile;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::MatchError;

/// Where the candidate profile comes from on each scoring run.
#[derive(Debug, Clone)]
pub enum ProfileLoader {
    /// Plain-text resume plus structured profile JSON. Missing files count as empty.
    Files {
        resume_text: PathBuf,
        profile_json: PathBuf,
    },
    Fixed(CandidateProfile),
}

impl ProfileLoader {
    pub fn files(resume_text: impl Into<PathBuf>, profile_json: impl Into<PathBuf>) -> Self {
        Self::Files {
            resume_text: resume_text.into(),
            profile_json: profile_json.into(),
        }
    }

    pub async fn load(&self) -> Result<CandidateProfile, MatchError> {
        match self {
            ProfileLoader::Fixed(profile) => Ok(profile.clone()),
            ProfileLoader::Files {
                resume_text,
                profile_json,
            } => {
                let resume = read_optional(resume_text).await?.unwrap_or_default();
                let profile = match read_optional(profile_json).await? {
                    Some(text) if !text.trim().is_empty() => {
                        serde_json::from_str(&text).map_err(|e| MatchError::ProfileLoad {
                            path: profile_json.clone(),
                            message: e.to_string(),
                        })?
                    }
                    _ => JsonValue::Object(Default::default()),
                };
                Ok(CandidateProfile::new(resume, profile))
            }
        }
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, MatchError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "profile file missing");
            Ok(None)
        }
        Err(err) => Err(MatchError::ProfileLoad {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_give_empty_profile() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ProfileLoader::files(dir.path().join("resume.txt"), dir.path().join("profile.json"));
        assert!(loader.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resume_and_profile_are_combined() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("resume.txt"), "Backend engineer.\n\nLaravel since 2015").unwrap();
        std::fs::write(
            dir.path().join("profile.json"),
            r#"{"headline": "PHP lead", "skills": ["Laravel", "Vue"]}"#,
        )
        .unwrap();
        let loader = ProfileLoader::files(dir.path().join("resume.txt"), dir.path().join("profile.json"));
        let profile = loader.load().await.unwrap();
        assert!(profile.corpus.contains("Backend engineer. Laravel since 2015"));
        assert!(profile.corpus.contains("PHP lead"));
        assert_eq!(profile.skills, vec!["Laravel", "Vue"]);
    }

    #[tokio::test]
    async fn malformed_profile_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("profile.json"), "{oops").unwrap();
        let loader = ProfileLoader::files(dir.path().join("resume.txt"), dir.path().join("profile.json"));
        assert!(matches!(loader.load().await, Err(MatchError::ProfileLoad { .. })));
    }
}
