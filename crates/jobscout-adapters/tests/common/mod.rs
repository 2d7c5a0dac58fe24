#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use jobscout_core::RawPosting;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenPosting {
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub url: String,
    pub salary: Option<String>,
    pub is_remote: bool,
}

pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .expect("workspace root")
}

pub fn fixture_path(source: &str, file: &str) -> PathBuf {
    workspace_root().join("fixtures").join(source).join("sample").join(file)
}

pub fn read_fixture(source: &str, file: &str) -> String {
    let path = fixture_path(source, file);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

pub fn read_snapshot(source: &str) -> Vec<GoldenPosting> {
    serde_json::from_str(&read_fixture(source, "snapshot.json")).expect("parse snapshot")
}

pub fn to_golden(postings: &[RawPosting]) -> Vec<GoldenPosting> {
    postings
        .iter()
        .map(|p| GoldenPosting {
            external_id: p.external_id.clone(),
            title: p.title.clone(),
            company: p.company.clone(),
            location: p.location.clone(),
            url: p.url.clone(),
            salary: p.salary.clone(),
            is_remote: p.is_remote,
        })
        .collect()
}
