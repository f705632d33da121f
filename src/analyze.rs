use anyhow::Result;
use regex::Regex;
use std::collections::HashSet;

/// Only articles in this language contribute keywords.
pub const KEYWORD_LANGUAGE: &str = "english";

/// Splits article text into normalized keyword candidates.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    whitespace: Regex,
    non_alpha: Regex,
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            whitespace: Regex::new(r"[ \t\n\x0B\x0C\r]+")?,
            non_alpha: Regex::new(r"[^a-z]+")?,
        })
    }

    /// Distinct words of `text`: lowercased, split on ASCII whitespace, with
    /// every character outside `a-z` removed. Tokens that end up empty are dropped.
    /// Unicode spaces such as NBSP do not separate words.
    pub fn unique_words(&self, text: &str) -> HashSet<String> {
        let lowered = text.to_lowercase();
        self.whitespace
            .split(&lowered)
            .map(|token| self.non_alpha.replace_all(token, ""))
            .filter(|word| !word.is_empty())
            .map(|word| word.into_owned())
            .collect()
    }
}
