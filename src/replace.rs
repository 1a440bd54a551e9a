use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnnotateError;
use crate::pattern::{build_pattern, MatchOptions};
use crate::span::MatchSpan;

/// A literal find/replace rule. An empty `find` makes the pair inert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacePair {
    pub find: String,
    pub replace: String,
}

impl ReplacePair {
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }

    pub fn is_inert(&self) -> bool {
        self.find.is_empty()
    }
}

/// Result of a replace pass that changed something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub text: String,
    /// Replaced ranges in `text`, ordered and non-overlapping.
    pub spans: Vec<MatchSpan>,
    /// Number of occurrences substituted across all pairs.
    pub count: usize,
}

/// One substitution inside a single pair's pass.
#[derive(Debug, Clone)]
struct Edit {
    /// Matched range in the text before the pass.
    from: Range<usize>,
    /// Replacement range in the text after the pass.
    to: Range<usize>,
}

/// Apply `pairs` in order, each pair seeing the text left by the ones before.
///
/// Matching is literal, case-insensitive unless `match_case`, and never
/// anchored to word boundaries. Fails with `EmptyInput` when every pair is
/// inert and with `NoMatch` when no pair found anything.
pub fn apply_replacements(
    text: &str,
    pairs: &[ReplacePair],
    match_case: bool,
) -> Result<Replacement, AnnotateError> {
    if pairs.iter().all(ReplacePair::is_inert) {
        return Err(AnnotateError::EmptyInput { what: "replace pairs" });
    }

    let options = MatchOptions::new(match_case, false);
    let mut current = text.to_owned();
    let mut ranges: Vec<Range<usize>> = Vec::new();
    let mut count = 0;

    for pair in pairs.iter().filter(|p| !p.is_inert()) {
        let Some(pattern) = build_pattern(&pair.find, options) else {
            continue;
        };

        let mut out = String::with_capacity(current.len());
        let mut edits = Vec::new();
        let mut last = 0;
        for found in pattern.find_iter(&current) {
            out.push_str(&current[last..found.start]);
            // out.len() is now the match offset plus the running length delta.
            let start = out.len();
            out.push_str(&pair.replace);
            edits.push(Edit {
                to: start..out.len(),
                from: found.clone(),
            });
            last = found.end;
        }
        if edits.is_empty() {
            continue;
        }
        out.push_str(&current[last..]);

        debug!(find = %pair.find, occurrences = edits.len(), "applied replace pair");
        count += edits.len();
        for range in &mut ranges {
            *range = remap(range.clone(), &edits);
        }
        ranges.extend(edits.into_iter().map(|e| e.to));
        ranges = coalesce(ranges);
        current = out;
    }

    if count == 0 {
        return Err(AnnotateError::NoMatch);
    }
    Ok(Replacement {
        text: current,
        spans: ranges.into_iter().map(MatchSpan::replaced).collect(),
        count,
    })
}

/// Carry a range recorded by an earlier pair through a later pair's edits.
/// An edit that cuts into the range widens it to cover the new text.
fn remap(range: Range<usize>, edits: &[Edit]) -> Range<usize> {
    let start = map_offset(range.start, edits, |e| e.to.start);
    let end = map_offset(range.end, edits, |e| e.to.end);
    start..end.max(start)
}

fn map_offset(offset: usize, edits: &[Edit], inside: impl Fn(&Edit) -> usize) -> usize {
    // (before, after) offsets known to line up across the pass.
    let mut anchor = (0, 0);
    for edit in edits {
        if offset <= edit.from.start {
            break;
        }
        if offset < edit.from.end {
            return inside(edit);
        }
        anchor = (edit.from.end, edit.to.end);
    }
    offset - anchor.0 + anchor.1
}

/// Sort and merge strictly overlapping ranges; touching ranges stay separate.
fn coalesce(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.sort_by_key(|r| (r.start, r.end));
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(prev) if range.start < prev.end => prev.end = prev.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(r: &Replacement) -> Vec<Range<usize>> {
        r.spans.iter().map(MatchSpan::range).collect()
    }

    #[test]
    fn offsets_track_growing_replacements() {
        let r = apply_replacements("a a a", &[ReplacePair::new("a", "bb")], false).unwrap();
        assert_eq!(r.text, "bb bb bb");
        assert_eq!(ranges(&r), vec![0..2, 3..5, 6..8]);
        assert_eq!(r.count, 3);
    }

    #[test]
    fn offsets_track_shrinking_replacements() {
        let r = apply_replacements("hello, hello!", &[ReplacePair::new("hello", "yo")], false)
            .unwrap();
        assert_eq!(r.text, "yo, yo!");
        assert_eq!(ranges(&r), vec![0..2, 4..6]);
    }

    #[test]
    fn very_long_find_term_is_replaced() {
        let term: String = "abcdefghij".chars().cycle().take(500_000).collect();
        let text = format!("x{term}y");
        let r = apply_replacements(&text, &[ReplacePair::new(term.as_str(), "Z")], true).unwrap();
        assert_eq!(r.text, "xZy");
        assert_eq!(r.count, 1);
        assert_eq!(ranges(&r), vec![1..2]);
    }

    #[test]
    fn inert_pairs_report_empty_input() {
        let pairs = [ReplacePair::new("", "x"), ReplacePair::default()];
        assert_eq!(
            apply_replacements("text", &pairs, false),
            Err(AnnotateError::EmptyInput { what: "replace pairs" })
        );
    }

    #[test]
    fn no_occurrence_reports_no_match() {
        assert_eq!(
            apply_replacements("text", &[ReplacePair::new("zzz", "x")], false),
            Err(AnnotateError::NoMatch)
        );
    }

    #[test]
    fn case_folding_follows_the_flag() {
        let pairs = [ReplacePair::new("Cat", "dog")];
        let folded = apply_replacements("cat CAT Cat", &pairs, false).unwrap();
        assert_eq!(folded.text, "dog dog dog");
        let exact = apply_replacements("cat CAT Cat", &pairs, true).unwrap();
        assert_eq!(exact.text, "cat CAT dog");
        assert_eq!(ranges(&exact), vec![8..11]);
    }

    #[test]
    fn replacement_ignores_word_boundaries() {
        let r = apply_replacements("concatenate cat", &[ReplacePair::new("cat", "X")], true)
            .unwrap();
        assert_eq!(r.text, "conXenate X");
        assert_eq!(r.count, 2);
    }

    #[test]
    fn later_pairs_see_earlier_substitutions() {
        let pairs = [ReplacePair::new("a", "b"), ReplacePair::new("b", "c")];
        let r = apply_replacements("a", &pairs, false).unwrap();
        assert_eq!(r.text, "c");
        assert_eq!(ranges(&r), vec![0..1]);
        assert_eq!(r.count, 2);
    }

    #[test]
    fn earlier_spans_shift_with_later_pairs() {
        let pairs = [ReplacePair::new("a", "xx"), ReplacePair::new("b", "yyy")];
        let r = apply_replacements("b a", &pairs, false).unwrap();
        assert_eq!(r.text, "yyy xx");
        assert_eq!(ranges(&r), vec![0..3, 4..6]);
    }

    #[test]
    fn later_edit_inside_an_earlier_span_widens_it() {
        let pairs = [ReplacePair::new("a", "xyz"), ReplacePair::new("y", "QQ")];
        let r = apply_replacements("-a-", &pairs, false).unwrap();
        assert_eq!(r.text, "-xQQz-");
        assert_eq!(ranges(&r), vec![1..5]);
    }

    #[test]
    fn replacement_text_is_literal() {
        let r = apply_replacements("cost", &[ReplacePair::new("cost", "$1 ${x}")], false)
            .unwrap();
        assert_eq!(r.text, "$1 ${x}");
    }

    #[test]
    fn deletion_records_a_zero_width_span() {
        let r = apply_replacements("a-b", &[ReplacePair::new("-", "")], false).unwrap();
        assert_eq!(r.text, "ab");
        assert_eq!(ranges(&r), vec![1..1]);
    }

    #[test]
    fn every_span_is_valid_in_the_output() {
        let pairs = [
            ReplacePair::new("the", "a"),
            ReplacePair::new("a", "the"),
            ReplacePair::new("e", "EEE"),
            ReplacePair::new("", "ignored"),
        ];
        let r = apply_replacements("the cat ate the hat", &pairs, false).unwrap();
        for pair in r.spans.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        for span in &r.spans {
            assert!(span.end <= r.text.len());
        }
    }
}
