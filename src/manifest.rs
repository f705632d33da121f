use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Everything loaded from the two manifests before any worker starts.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub batches: Vec<PathBuf>,
    pub languages: Vec<String>,
    pub categories: Vec<String>,
    pub forbidden: HashSet<String>,
}

// Every input list starts with a header line that carries no data.
fn read_entries(path: &Path) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read list {:?}", path))?;
    Ok(content
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn base_dir(manifest: &Path) -> &Path {
    manifest.parent().unwrap_or_else(|| Path::new(""))
}

/// Read the article manifest; entries resolve against the manifest's directory.
pub fn load_article_manifest(path: &Path) -> Result<Vec<PathBuf>> {
    let base = base_dir(path);
    Ok(read_entries(path)?
        .into_iter()
        .map(|entry| base.join(entry))
        .collect())
}

/// Read the auxiliary manifest naming the languages, categories and
/// forbidden-words lists, in that order. Like the batches, those lists
/// resolve against the article manifest's directory.
pub fn load_run_config(articles: &Path, inputs: &Path) -> Result<RunConfig> {
    let start_time = Instant::now();
    info!(
        action = "start",
        component = "manifest_loading",
        "Loading input manifests"
    );

    let batches = load_article_manifest(articles)?;

    let base = base_dir(articles);
    let lists = read_entries(inputs)?;
    let [languages_path, categories_path, forbidden_path] = match lists.as_slice() {
        [languages, categories, forbidden, ..] => [
            base.join(languages),
            base.join(categories),
            base.join(forbidden),
        ],
        _ => anyhow::bail!(
            "Input manifest {:?} must list the languages, categories and forbidden words files",
            inputs
        ),
    };

    let languages = read_entries(&languages_path)?;
    let categories = read_entries(&categories_path)?;
    let forbidden: HashSet<String> = read_entries(&forbidden_path)?.into_iter().collect();

    info!(
        action = "complete",
        component = "manifest_loading",
        batch_count = batches.len(),
        language_count = languages.len(),
        category_count = categories.len(),
        forbidden_count = forbidden.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Loaded input manifests"
    );

    Ok(RunConfig {
        batches,
        languages,
        categories,
        forbidden,
    })
}
