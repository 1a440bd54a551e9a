use crate::collect::PatternSource;
use crate::error::AnnotateError;
use crate::pattern::{build_pattern, MatchOptions};
use crate::span::{DisplayClass, KEYWORD_PRIORITY};

/// Ordered keyword list without duplicates. A keyword's colour is its
/// insertion index modulo the palette size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    words: Vec<String>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the persisted comma-joined form. Blank entries and duplicates are dropped.
    pub fn from_joined(joined: &str) -> Self {
        let mut set = Self::new();
        for word in joined.split(',') {
            let _ = set.add(word);
        }
        set
    }

    pub fn joined(&self) -> String {
        self.words.join(",")
    }

    /// Add a keyword. Surrounding whitespace is trimmed. Returns `Ok(false)`
    /// if it was already present; use [`KeywordSet::add_all`] for a list.
    pub fn add(&mut self, word: &str) -> Result<bool, AnnotateError> {
        let word = word.trim();
        if word.is_empty() {
            return Err(AnnotateError::EmptyInput { what: "keyword" });
        }
        if word.contains(',') {
            return Err(AnnotateError::InvalidKeyword { word: word.to_owned() });
        }
        if self.contains(word) {
            return Ok(false);
        }
        self.words.push(word.to_owned());
        Ok(true)
    }

    /// Add every entry of a comma-separated list; returns how many were new.
    pub fn add_all(&mut self, list: &str) -> Result<usize, AnnotateError> {
        let mut added = 0;
        let mut any = false;
        for word in list.split(',').filter(|w| !w.trim().is_empty()) {
            any = true;
            if self.add(word)? {
                added += 1;
            }
        }
        if !any {
            return Err(AnnotateError::EmptyInput { what: "keyword" });
        }
        Ok(added)
    }

    pub fn remove(&mut self, word: &str) -> bool {
        let word = word.trim();
        let before = self.words.len();
        self.words.retain(|w| w != word);
        self.words.len() != before
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    /// One pattern source per keyword, coloured by insertion index.
    pub fn sources(&self, options: MatchOptions) -> Vec<PatternSource> {
        self.words
            .iter()
            .enumerate()
            .filter_map(|(index, word)| {
                build_pattern(word, options).map(|pattern| {
                    PatternSource::new(pattern, DisplayClass::keyword(index), KEYWORD_PRIORITY)
                })
            })
            .collect()
    }
}
