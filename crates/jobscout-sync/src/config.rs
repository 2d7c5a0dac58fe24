use std::path::PathBuf;
use std::time::Duration;

use jobscout_core::SearchQuery;

const DEFAULT_INTERVAL_MINUTES: u64 = 720;

/// Runtime settings read from the environment. Every value has a default, and
/// values that fail to parse fall back to it.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub user_agent: String,
    pub query: SearchQuery,
    pub per_source_limit: usize,
    pub board_timeout: Duration,
    pub source_timeout: Duration,
    pub linkedin_pages: usize,
    pub indeed_pages: usize,
    pub glassdoor_pages: usize,
    pub company_feeds: Vec<String>,
    /// When set, the live boards are replaced by one static adapter per
    /// `<slug>.json` file in this directory.
    pub static_jobs_dir: Option<PathBuf>,
    pub tag_rules_path: PathBuf,
    pub scheduler_enabled: bool,
    pub scheduler_interval: Duration,
    pub min_match_score: f64,
    pub resume_text_path: PathBuf,
    pub profile_json_path: PathBuf,
    pub web_port: u16,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &str, default: u64| get(key).and_then(|v| v.parse().ok()).unwrap_or(default);
        let list = |key: &str, default: &[&str]| {
            let parsed = get(key).map(|v| parse_list(&v)).unwrap_or_default();
            if parsed.is_empty() {
                default.iter().map(|s| s.to_string()).collect()
            } else {
                parsed
            }
        };

        Self {
            database_url: get("DATABASE_URL"),
            user_agent: get("JOBSCOUT_USER_AGENT")
                .unwrap_or_else(|| "Mozilla/5.0 (compatible; JobScout/0.1)".to_string()),
            query: SearchQuery {
                terms: list("JOB_SEARCH_TERMS", &["Senior Laravel Developer"]),
                locations: list("JOB_LOCATIONS", &["Remote", "Egypt"]),
                job_types: list("JOB_TYPES", &["full-time", "remote"]),
                remote_only: get("JOB_REMOTE_ONLY").map(|v| parse_bool(&v)).unwrap_or(false),
                salary_min: get("JOB_SALARY_MIN").and_then(|v| v.parse().ok()),
            },
            per_source_limit: number("FETCH_PAGE_SIZE", 20) as usize,
            board_timeout: Duration::from_secs(number("JOB_BOARD_TIMEOUT_SECS", 15)),
            source_timeout: Duration::from_secs(number("JOB_SOURCE_TIMEOUT_SECS", 60)),
            linkedin_pages: number("LINKEDIN_SEARCH_PAGES", 1) as usize,
            indeed_pages: number("INDEED_SEARCH_PAGES", 1) as usize,
            glassdoor_pages: number("GLASSDOOR_SEARCH_PAGES", 1) as usize,
            company_feeds: list("COMPANY_FEEDS", &[]),
            static_jobs_dir: get("STATIC_JOBS_DIR").map(PathBuf::from),
            tag_rules_path: get("JOBSCOUT_TAG_RULES")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("rules/tags.yaml")),
            scheduler_enabled: get("SCHEDULER_ENABLED").map(|v| parse_bool(&v)).unwrap_or(true),
            scheduler_interval: Duration::from_secs(
                number("SCHEDULER_INTERVAL_MINUTES", DEFAULT_INTERVAL_MINUTES)
                    .max(1)
                    .checked_mul(60)
                    .unwrap_or(DEFAULT_INTERVAL_MINUTES * 60),
            ),
            min_match_score: get("MIN_MATCH_SCORE")
                .and_then(|v| v.parse().ok())
                .filter(|v: &f64| v.is_finite())
                .unwrap_or(0.35),
            resume_text_path: get("RESUME_TEXT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/resume.txt")),
            profile_json_path: get("PROFILE_JSON_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/profile.json")),
            web_port: get("JOBSCOUT_WEB_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// JSON array or comma-separated list.
fn parse_list(value: &str) -> Vec<String> {
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str::<serde_json::Value>(value) {
        return items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> SyncConfig {
        let env = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        SyncConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = SyncConfig::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.per_source_limit, 20);
        assert_eq!(config.board_timeout, Duration::from_secs(15));
        assert_eq!(config.scheduler_interval, Duration::from_secs(720 * 60));
        assert!(config.scheduler_enabled);
        assert_eq!(config.min_match_score, 0.35);
        assert_eq!(config.query.locations, vec!["Remote", "Egypt"]);
        assert!(config.company_feeds.is_empty());
        assert_eq!(config.web_port, 8000);
    }

    #[test]
    fn lists_accept_json_or_commas() {
        let config = config_from(&[
            ("JOB_SEARCH_TERMS", r#"["PHP Developer", "Laravel Engineer"]"#),
            ("JOB_LOCATIONS", "Cairo, Remote ,"),
        ]);
        assert_eq!(config.query.terms, vec!["PHP Developer", "Laravel Engineer"]);
        assert_eq!(config.query.locations, vec!["Cairo", "Remote"]);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("FETCH_PAGE_SIZE", "lots"),
            ("MIN_MATCH_SCORE", "0.5"),
            ("JOB_SALARY_MIN", "90000"),
            ("SCHEDULER_ENABLED", "off"),
            ("DATABASE_URL", "  "),
        ]);
        assert_eq!(config.per_source_limit, 20);
        assert_eq!(config.min_match_score, 0.5);
        assert_eq!(config.query.salary_min, Some(90_000));
        assert!(!config.scheduler_enabled);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn oversized_interval_falls_back_to_default() {
        let config = config_from(&[("SCHEDULER_INTERVAL_MINUTES", "1000000000000000000")]);
        assert_eq!(config.scheduler_interval, Duration::from_secs(720 * 60));

        let config = config_from(&[("SCHEDULER_INTERVAL_MINUTES", "0")]);
        assert_eq!(config.scheduler_interval, Duration::from_secs(60));
    }

    #[test]
    fn non_finite_min_score_falls_back_to_default() {
        for raw in ["NaN", "inf", "-inf"] {
            let config = config_from(&[("MIN_MATCH_SCORE", raw)]);
            assert_eq!(config.min_match_score, 0.35, "MIN_MATCH_SCORE={raw}");
        }
    }
}
