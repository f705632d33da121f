//! Shared aggregation state, built once per run and mutated concurrently by
//! every worker.
//!
//! The known category and language sets are fixed at construction: the outer
//! maps are plain `HashMap`s that are never written again, and only their
//! member sets are concurrent. Everything else is a sharded `DashMap`/`DashSet`
//! or an atomic counter.

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::analyze::{Tokenizer, KEYWORD_LANGUAGE};
use crate::article::Article;
use crate::manifest::RunConfig;

/// What happens to the first article of an id or title seen more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Flag the colliding id, and every article sharing a title with the
    /// first one included, so no copy survives cleanup.
    #[default]
    DropAll,
    /// Flag only the later articles; the first writer survives.
    KeepFirst,
}

/// Outcome of offering one decoded article to the dedup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    Accepted,
    DuplicateId,
    DuplicateTitle,
}

#[derive(Debug)]
pub struct Aggregate {
    articles: DashMap<String, Arc<Article>>,
    titles: DashMap<String, String>,
    duplicates: DashSet<String>,
    categories: HashMap<String, DashSet<String>>,
    languages: HashMap<String, DashSet<String>>,
    keywords: DashMap<String, AtomicUsize>,
    authors: DashMap<String, AtomicUsize>,
    forbidden: HashSet<String>,
    total_seen: AtomicUsize,
    policy: DuplicatePolicy,
}

fn member_sets(names: &[String]) -> HashMap<String, DashSet<String>> {
    names
        .iter()
        .map(|name| (name.clone(), DashSet::new()))
        .collect()
}

// Counters are only read after a barrier, which orders every increment before the read.
fn bump(counts: &DashMap<String, AtomicUsize>, key: &str) {
    if let Some(count) = counts.get(key) {
        count.fetch_add(1, Ordering::Relaxed);
        return;
    }
    counts
        .entry(key.to_string())
        .or_insert_with(|| AtomicUsize::new(0))
        .fetch_add(1, Ordering::Relaxed);
}

fn snapshot_counts(counts: &DashMap<String, AtomicUsize>) -> Vec<(String, usize)> {
    counts
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
        .collect()
}

impl Aggregate {
    pub fn new(config: &RunConfig, policy: DuplicatePolicy) -> Self {
        Self {
            articles: DashMap::new(),
            titles: DashMap::new(),
            duplicates: DashSet::new(),
            categories: member_sets(&config.categories),
            languages: member_sets(&config.languages),
            keywords: DashMap::new(),
            authors: DashMap::new(),
            forbidden: config.forbidden.clone(),
            total_seen: AtomicUsize::new(0),
            policy,
        }
    }

    /// Offer one decoded article. The first article with a given id is kept;
    /// nothing already stored is ever overwritten.
    pub fn ingest(&self, article: Article) -> Ingested {
        self.total_seen.fetch_add(1, Ordering::Relaxed);

        let uuid = article.uuid.clone();
        let title = article.title.clone();

        let inserted = match self.articles.entry(uuid.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(article));
                true
            }
        };
        if !inserted {
            // Flagging the id removes the stored copy too, so only DropAll does it.
            if self.policy == DuplicatePolicy::DropAll {
                self.duplicates.insert(uuid);
            }
            return Ingested::DuplicateId;
        }

        let first_seen = match self.titles.entry(title) {
            Entry::Occupied(existing) => Some(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(uuid.clone());
                None
            }
        };
        match first_seen {
            None => Ingested::Accepted,
            Some(first) => {
                self.duplicates.insert(uuid);
                if self.policy == DuplicatePolicy::DropAll {
                    self.duplicates.insert(first);
                }
                Ingested::DuplicateTitle
            }
        }
    }

    /// Drop every flagged id from the dedup table; returns how many entries went.
    pub fn remove_duplicates(&self) -> usize {
        self.duplicates
            .iter()
            .filter(|uuid| self.articles.remove(uuid.key()).is_some())
            .count()
    }

    pub fn clear_duplicates(&self) {
        self.duplicates.clear();
    }

    pub fn pending_duplicates(&self) -> usize {
        self.duplicates.len()
    }

    /// Surviving articles ordered by id.
    pub fn snapshot(&self) -> Vec<Arc<Article>> {
        let mut articles: Vec<Arc<Article>> = self
            .articles
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        articles.sort_unstable_by(|a, b| a.uuid.cmp(&b.uuid));
        articles
    }

    /// Fold one surviving article into the category, language, keyword and
    /// author aggregates. Unknown categories and languages are ignored.
    pub fn analyze(&self, article: &Article, tokenizer: &Tokenizer) {
        for category in &article.categories {
            if let Some(members) = self.categories.get(category) {
                members.insert(article.uuid.clone());
            }
        }

        if let Some(members) = self.languages.get(&article.language) {
            members.insert(article.uuid.clone());
        }

        if article.language == KEYWORD_LANGUAGE {
            for word in tokenizer.unique_words(&article.text) {
                if !self.forbidden.contains(&word) {
                    bump(&self.keywords, &word);
                }
            }
        }

        bump(&self.authors, &article.author);
    }

    pub fn categories(&self) -> &HashMap<String, DashSet<String>> {
        &self.categories
    }

    pub fn languages(&self) -> &HashMap<String, DashSet<String>> {
        &self.languages
    }

    pub fn keyword_counts(&self) -> Vec<(String, usize)> {
        snapshot_counts(&self.keywords)
    }

    pub fn author_counts(&self) -> Vec<(String, usize)> {
        snapshot_counts(&self.authors)
    }

    pub fn total_seen(&self) -> usize {
        self.total_seen.load(Ordering::Relaxed)
    }

    pub fn unique_count(&self) -> usize {
        self.articles.len()
    }

    /// Articles seen minus articles surviving.
    pub fn duplicates_found(&self) -> usize {
        self.total_seen().saturating_sub(self.unique_count())
    }
}
