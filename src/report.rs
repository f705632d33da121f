//! Ranking rules and output for the five report tasks and the summary.

use dashmap::DashSet;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{error, info};

use crate::aggregate::Aggregate;
use crate::article::Article;
use crate::error::PipelineError;

pub const EXTENSION: &str = "txt";
pub const ARTICLES_REPORT: &str = "all_articles";
pub const KEYWORDS_REPORT: &str = "keywords_count";
pub const SUMMARY_REPORT: &str = "reports";

/// One unit of phase-four work. Each task touches its own ranking only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportTask {
    WriteCategories,
    WriteLanguages,
    WriteArticles,
    WriteKeywords,
    SortAuthors,
}

impl ReportTask {
    pub const ALL: [ReportTask; 5] = [
        ReportTask::WriteCategories,
        ReportTask::WriteLanguages,
        ReportTask::WriteArticles,
        ReportTask::WriteKeywords,
        ReportTask::SortAuthors,
    ];
}

/// A category or language with its members in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSet {
    pub name: String,
    pub members: Vec<String>,
}

/// Rankings produced in phase four and read by the summary.
#[derive(Debug, Default)]
pub struct Rankings {
    pub categories: OnceLock<Vec<MemberSet>>,
    pub languages: OnceLock<Vec<MemberSet>>,
    pub articles: OnceLock<Vec<Arc<Article>>>,
    pub keywords: OnceLock<Vec<(String, usize)>>,
    pub authors: OnceLock<Vec<(String, usize)>>,
}

fn published<'a, T>(
    slot: &'a OnceLock<T>,
    name: &'static str,
) -> Result<&'a T, PipelineError> {
    slot.get().ok_or(PipelineError::MissingPhaseOutput(name))
}

/// Category names become file names with commas dropped and spaces turned into `_`.
pub fn sanitize_category(name: &str) -> String {
    name.replace(',', "").replace(' ', "_")
}

/// Order by member count descending, then name ascending.
pub fn rank_member_sets(sets: &HashMap<String, DashSet<String>>) -> Vec<MemberSet> {
    let mut ranked: Vec<MemberSet> = sets
        .iter()
        .map(|(name, members)| {
            let mut members: Vec<String> = members.iter().map(|id| id.key().clone()).collect();
            members.sort_unstable();
            MemberSet {
                name: name.clone(),
                members,
            }
        })
        .collect();
    ranked.sort_unstable_by(|a, b| {
        b.members
            .len()
            .cmp(&a.members.len())
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked
}

/// Most recent first; equal timestamps fall back to ascending id.
pub fn compare_articles(a: &Article, b: &Article) -> Ordering {
    b.published
        .cmp(&a.published)
        .then_with(|| a.uuid.cmp(&b.uuid))
}

pub fn rank_articles(mut articles: Vec<Arc<Article>>) -> Vec<Arc<Article>> {
    articles.par_sort_unstable_by(|a, b| compare_articles(a, b));
    articles
}

/// Drop zero counts, then order by count descending and name ascending.
pub fn rank_counts(mut counts: Vec<(String, usize)>) -> Vec<(String, usize)> {
    counts.retain(|(_, count)| *count > 0);
    counts.par_sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Writes line-oriented report files into one output directory.
///
/// A failed write is logged and reported as `false`; it never aborts the run.
#[derive(Debug)]
pub struct ReportWriter {
    out_dir: PathBuf,
    written: AtomicUsize,
}

impl ReportWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            written: AtomicUsize::new(0),
        }
    }

    pub fn path_for(&self, stem: &str) -> PathBuf {
        self.out_dir.join(format!("{stem}.{EXTENSION}"))
    }

    /// Number of files written successfully so far.
    pub fn files_written(&self) -> usize {
        self.written.load(AtomicOrdering::Relaxed)
    }

    pub fn write_lines<I>(&self, stem: &str, lines: I) -> bool
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let path = self.path_for(stem);
        match write_file(&path, lines) {
            Ok(line_count) => {
                self.written.fetch_add(1, AtomicOrdering::Relaxed);
                info!(
                    action = "write",
                    component = "report_writer",
                    file_path = ?path,
                    line_count,
                    "Report written"
                );
                true
            }
            Err(e) => {
                error!(
                    action = "write",
                    component = "report_writer",
                    file_path = ?path,
                    error = %e,
                    "Failed to write report, skipping"
                );
                false
            }
        }
    }
}

fn write_file<I>(path: &Path, lines: I) -> io::Result<usize>
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut writer = BufWriter::new(File::create(path)?);
    let mut count = 0;
    for line in lines {
        writeln!(writer, "{line}")?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

fn write_member_sets<F>(writer: &ReportWriter, sets: &[MemberSet], file_stem: F)
where
    F: Fn(&str) -> String,
{
    for set in sets.iter().filter(|set| !set.members.is_empty()) {
        writer.write_lines(&file_stem(&set.name), &set.members);
    }
}

/// Run one phase-four task: compute its ranking, write its file (if any)
/// and publish the ranking for the summary.
pub fn run_task(
    task: ReportTask,
    aggregate: &Aggregate,
    rankings: &Rankings,
    writer: &ReportWriter,
) {
    let start_time = Instant::now();
    match task {
        ReportTask::WriteCategories => {
            let ranked = rank_member_sets(aggregate.categories());
            write_member_sets(writer, &ranked, sanitize_category);
            let _ = rankings.categories.set(ranked);
        }
        ReportTask::WriteLanguages => {
            let ranked = rank_member_sets(aggregate.languages());
            write_member_sets(writer, &ranked, str::to_string);
            let _ = rankings.languages.set(ranked);
        }
        ReportTask::WriteArticles => {
            let ranked = rank_articles(aggregate.snapshot());
            writer.write_lines(
                ARTICLES_REPORT,
                ranked
                    .iter()
                    .map(|article| format!("{} {}", article.uuid, article.published)),
            );
            let _ = rankings.articles.set(ranked);
        }
        ReportTask::WriteKeywords => {
            let ranked = rank_counts(aggregate.keyword_counts());
            writer.write_lines(
                KEYWORDS_REPORT,
                ranked.iter().map(|(word, count)| format!("{word} {count}")),
            );
            let _ = rankings.keywords.set(ranked);
        }
        ReportTask::SortAuthors => {
            let _ = rankings.authors.set(rank_counts(aggregate.author_counts()));
        }
    }
    info!(
        action = "complete",
        component = "report_task",
        task = ?task,
        duration_ms = start_time.elapsed().as_millis(),
        "Report task finished"
    );
}

/// The seven headline values written to the summary report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SummaryReport {
    pub duplicates_found: usize,
    pub unique_articles: usize,
    pub best_author: Option<(String, usize)>,
    pub top_language: Option<(String, usize)>,
    pub top_category: Option<(String, usize)>,
    pub most_recent_article: Option<(String, String)>,
    pub top_keyword: Option<(String, usize)>,
}

fn pair<A: Display, B: Display>(value: &Option<(A, B)>) -> String {
    match value {
        Some((a, b)) => format!("{a} {b}"),
        None => "none".to_string(),
    }
}

fn top_member_set(sets: &[MemberSet]) -> Option<&MemberSet> {
    sets.first().filter(|set| !set.members.is_empty())
}

impl SummaryReport {
    pub fn from_rankings(
        aggregate: &Aggregate,
        rankings: &Rankings,
    ) -> Result<Self, PipelineError> {
        let categories = published(&rankings.categories, "category ranking")?;
        let languages = published(&rankings.languages, "language ranking")?;
        let articles = published(&rankings.articles, "article ranking")?;
        let keywords = published(&rankings.keywords, "keyword ranking")?;
        let authors = published(&rankings.authors, "author ranking")?;

        Ok(Self {
            duplicates_found: aggregate.duplicates_found(),
            unique_articles: aggregate.unique_count(),
            best_author: authors.first().cloned(),
            top_language: top_member_set(languages)
                .map(|set| (set.name.clone(), set.members.len())),
            top_category: top_member_set(categories)
                .map(|set| (sanitize_category(&set.name), set.members.len())),
            most_recent_article: articles
                .first()
                .map(|article| (article.published.clone(), article.url.clone())),
            top_keyword: keywords.first().cloned(),
        })
    }

    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("duplicates_found - {}", self.duplicates_found),
            format!("unique_articles - {}", self.unique_articles),
            format!("best_author - {}", pair(&self.best_author)),
            format!("top_language - {}", pair(&self.top_language)),
            format!("top_category - {}", pair(&self.top_category)),
            format!("most_recent_article - {}", pair(&self.most_recent_article)),
            format!("top_keyword_en - {}", pair(&self.top_keyword)),
        ]
    }
}
