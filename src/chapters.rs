use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// A chapter heading and the text it introduces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    /// The label after "Chapter", e.g. `12` or `XIV`.
    pub number: String,
    pub heading: String,
    /// From the heading line up to the next heading or the end of the text.
    pub range: Range<usize>,
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Only the word "chapter" folds case; roman numerals must be capitals.
        Regex::new(r"(?m)^[ \t]*(?i:chapter)[ \t]+([0-9]+|[IVXLCDM]+)\b[^\r\n]*")
            .expect("chapter heading regex is valid")
    })
}

/// Find every line that starts with a `Chapter <number>` label.
pub fn extract_chapters(text: &str) -> Vec<Chapter> {
    let heads: Vec<(Range<usize>, String)> = heading_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps.get(1)?.as_str().to_owned();
            Some((whole.range(), number))
        })
        .collect();

    heads
        .iter()
        .enumerate()
        .map(|(i, (line, number))| {
            let end = heads.get(i + 1).map_or(text.len(), |(next, _)| next.start);
            Chapter {
                number: number.clone(),
                heading: text[line.clone()].trim().to_owned(),
                range: line.start..end,
            }
        })
        .collect()
}

/// Text of the chapter labelled `number` (case-insensitive for roman numerals).
pub fn chapter_text<'a>(text: &'a str, number: &str) -> Option<&'a str> {
    extract_chapters(text)
        .into_iter()
        .find(|c| c.number.eq_ignore_ascii_case(number))
        .map(|c| &text[c.range])
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK: &str = "Title page\n\nChapter 1: Loomings\nCall me Ishmael.\n\n  CHAPTER II The Carpet-Bag\nI stuffed a shirt.\nchapters are not headings\nChapter 3\nThe end.";

    #[test]
    fn finds_numbered_and_roman_headings() {
        let chapters = extract_chapters(BOOK);
        let numbers: Vec<_> = chapters.iter().map(|c| c.number.as_str()).collect();
        assert_eq!(numbers, vec!["1", "II", "3"]);
        assert_eq!(chapters[0].heading, "Chapter 1: Loomings");
        assert_eq!(chapters[1].heading, "CHAPTER II The Carpet-Bag");
    }

    #[test]
    fn chapter_ranges_tile_the_rest_of_the_text() {
        let chapters = extract_chapters(BOOK);
        assert_eq!(chapters.last().unwrap().range.end, BOOK.len());
        for pair in chapters.windows(2) {
            assert_eq!(pair[0].range.end, pair[1].range.start);
        }
    }

    #[test]
    fn extracts_one_chapter() {
        let text = chapter_text(BOOK, "ii").unwrap();
        assert!(text.starts_with("  CHAPTER II"));
        assert!(text.contains("I stuffed a shirt."));
        assert!(!text.contains("Chapter 3"));
        assert!(chapter_text(BOOK, "9").is_none());
    }

    #[test]
    fn lowercase_words_are_not_numerals() {
        let text = "Chapter did not end there.\nchapter mild\nCHAPTER IV\nChapter Dim";
        let numbers: Vec<_> = extract_chapters(text).into_iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec!["IV"]);
    }

    #[test]
    fn no_headings() {
        assert!(extract_chapters("just prose").is_empty());
    }
}
