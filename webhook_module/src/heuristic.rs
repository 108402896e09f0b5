//! Guessing personal names in free text.
//!
//! A name is a capitalized word optionally followed by a space and a
//! capitalized last initial ("Jane D"), or a lone capitalized word ("Marcus").
//! Matches whose lowercase form is an English dictionary word are dropped.
//! This misses lowercase names and names that are also words ("Will"), and
//! lets through other proper nouns; no roster has to be maintained.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;

pub const DEFAULT_NAME_PATTERN: &str = r"([A-Z][A-Za-z]* [A-Z]|[A-Z][A-Za-z]*)";

const DEFAULT_WORD_LIST: &str = include_str!("../data/english_words.txt");

#[derive(Debug, thiserror::Error)]
pub enum HeuristicError {
    #[error("invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("failed to read word list {path}: {source}")]
    WordList {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Lowercase English words that are never treated as names.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    words: HashSet<String>,
}

impl Dictionary {
    /// One word per line; blank lines and `#` comments are skipped.
    pub fn from_word_list(contents: &str) -> Self {
        let words = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_lowercase)
            .collect();
        Self { words }
    }

    pub fn load(path: &Path) -> Result<Self, HeuristicError> {
        let contents = std::fs::read_to_string(path).map_err(|source| HeuristicError::WordList {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_word_list(&contents))
    }

    pub fn english() -> Self {
        Self::from_word_list(DEFAULT_WORD_LIST)
    }

    /// Case-insensitive membership.
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Dictionary {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            words: iter.into_iter().map(|w| w.into().to_lowercase()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NameHeuristic {
    pattern: Regex,
    dictionary: Dictionary,
}

impl NameHeuristic {
    pub fn new(pattern: Regex, dictionary: Dictionary) -> Self {
        Self {
            pattern,
            dictionary,
        }
    }

    pub fn with_pattern(pattern: &str, dictionary: Dictionary) -> Result<Self, HeuristicError> {
        Ok(Self::new(Regex::new(pattern)?, dictionary))
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Candidate names in match order, duplicates kept.
    pub fn find_names(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|candidate| !self.dictionary.contains(candidate))
            .map(str::to_string)
            .collect()
    }
}

impl Default for NameHeuristic {
    fn default() -> Self {
        let pattern = Regex::new(DEFAULT_NAME_PATTERN).expect("default name pattern compiles");
        Self::new(pattern, Dictionary::english())
    }
}
