//! Literal term matching with optional case folding and word-boundary anchoring.

use std::ops::Range;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Compiled program and lazy DFA cache budget for short terms. Longer terms
/// get a budget proportional to their escaped length.
const BASE_SIZE_LIMIT: usize = 10 * (1 << 20);
const SIZE_LIMIT_PER_BYTE: usize = 1 << 10;

/// Flags controlling how a literal term is matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub match_case: bool,
    pub whole_words: bool,
}

impl MatchOptions {
    pub fn new(match_case: bool, whole_words: bool) -> Self {
        Self { match_case, whole_words }
    }
}

/// A compiled literal matcher. Every metacharacter of the term is escaped, so
/// the only non-literal parts are the optional `\b` anchors.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

/// Build a matcher for `term`. An empty term yields `None` (nothing to match).
pub fn build_pattern(term: &str, options: MatchOptions) -> Option<Pattern> {
    if term.is_empty() {
        return None;
    }
    let escaped = regex::escape(term);
    let source = if options.whole_words {
        format!(r"\b{escaped}\b")
    } else {
        escaped
    };
    let limit = BASE_SIZE_LIMIT.max(source.len().saturating_mul(SIZE_LIMIT_PER_BYTE));
    match RegexBuilder::new(&source)
        .case_insensitive(!options.match_case)
        .size_limit(limit)
        .dfa_size_limit(limit)
        .build()
    {
        Ok(regex) => Some(Pattern { regex }),
        Err(err) => {
            warn!(error = %err, term_len = term.len(), "could not compile term");
            None
        }
    }
}

impl Pattern {
    /// Successive non-overlapping matches, left to right.
    pub fn find_iter<'t>(&self, text: &'t str) -> impl Iterator<Item = Range<usize>> + 't {
        // Regex is internally reference counted, so the clone is cheap.
        let regex = self.regex.clone();
        let mut cursor = 0;
        std::iter::from_fn(move || {
            if cursor > text.len() {
                return None;
            }
            let found = regex.find_at(text, cursor)?.range();
            cursor = if found.is_empty() {
                next_char_boundary(text, found.end)
            } else {
                found.end
            };
            Some(found)
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

fn next_char_boundary(text: &str, at: usize) -> usize {
    text[at..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| at + c.len_utf8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn count(term: &str, text: &str, match_case: bool, whole_words: bool) -> usize {
        build_pattern(term, MatchOptions::new(match_case, whole_words))
            .map_or(0, |p| p.find_iter(text).count())
    }

    #[rstest]
    #[case(false, 3)]
    #[case(true, 1)]
    fn case_sensitivity(#[case] match_case: bool, #[case] expected: usize) {
        assert_eq!(count("Hello", "hello HELLO Hello", match_case, false), expected);
    }

    #[test]
    fn case_sensitive_match_is_the_exact_spelling() {
        let p = build_pattern("Hello", MatchOptions::new(true, false)).unwrap();
        let found: Vec<_> = p.find_iter("hello HELLO Hello").collect();
        assert_eq!(found, vec![12..17]);
    }

    #[rstest]
    #[case(true, 1)]
    #[case(false, 3)]
    fn whole_word_boundary(#[case] whole_words: bool, #[case] expected: usize) {
        assert_eq!(
            count("cat", "concatenate cat category", false, whole_words),
            expected
        );
    }

    #[test]
    fn metacharacters_are_literal() {
        assert_eq!(count("a.c", "abc a.c", true, false), 1);
        assert_eq!(count("(x)*", "(x)* xx", true, false), 1);
        assert_eq!(count("$1", "cost $1 or $10", true, true), 0);
        assert_eq!(count("$1", "cost $1 or $10", true, false), 2);
    }

    #[test]
    fn empty_term_builds_nothing() {
        assert!(build_pattern("", MatchOptions::default()).is_none());
    }

    #[test]
    fn scan_advances_past_each_match() {
        // "aa" inside "aaaa" is found twice, never at the overlapping offset 1.
        let p = build_pattern("aa", MatchOptions::new(true, false)).unwrap();
        let found: Vec<_> = p.find_iter("aaaa").collect();
        assert_eq!(found, vec![0..2, 2..4]);
    }

    #[test]
    fn word_characters_include_digits_and_underscore() {
        assert_eq!(count("cat", "cat_1 cat2 cat", true, true), 1);
    }

    #[test]
    fn long_terms_still_compile() {
        let term: String = "whale sea ship ".chars().cycle().take(200_000).collect();
        let p = build_pattern(&term, MatchOptions::new(false, false)).unwrap();
        let text = format!("<{}>", term.to_uppercase());
        assert_eq!(p.find_iter(&text).collect::<Vec<_>>(), vec![1..200_001]);
    }

    #[test]
    fn multibyte_offsets_stay_on_char_boundaries() {
        let p = build_pattern("café", MatchOptions::new(false, true)).unwrap();
        let text = "un CAFÉ, deux café";
        let found: Vec<_> = p.find_iter(text).collect();
        assert_eq!(found.len(), 2);
        for range in found {
            assert!(text.is_char_boundary(range.start));
            assert!(text.is_char_boundary(range.end));
        }
    }
}
