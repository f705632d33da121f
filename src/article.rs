use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A single news article as it appears in a batch file.
///
/// Articles are immutable once decoded; the pipeline shares them behind `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Article {
    pub uuid: String,
    pub title: String,
    pub author: String,
    pub url: String,
    pub text: String,
    /// Publication timestamp, compared as a plain string.
    pub published: String,
    pub language: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Decode a batch file holding a JSON array of articles.
pub fn read_batch(path: &Path) -> Result<Vec<Article>> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read article batch {:?}", path))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to decode article batch {:?}", path))
}
