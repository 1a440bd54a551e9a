use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Number of distinct keyword colours; keyword `i` uses colour `i % PALETTE_SIZE`.
pub const PALETTE_SIZE: usize = 8;

/// Priority tier shared by all keyword matches.
pub const KEYWORD_PRIORITY: u8 = 0;
/// Priority tier of replaced-range markers; always wins a collision.
pub const REPLACED_PRIORITY: u8 = u8::MAX;

/// How a tagged region should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "color")]
pub enum DisplayClass {
    /// A keyword occurrence, carrying its palette index.
    Keyword(usize),
    /// Text produced by the most recent replace pass.
    Replaced,
}

impl DisplayClass {
    pub fn keyword(index: usize) -> Self {
        Self::Keyword(index % PALETTE_SIZE)
    }

    pub fn is_replaced(self) -> bool {
        matches!(self, Self::Replaced)
    }

    /// Stable CSS-style class name.
    pub fn css_class(self) -> String {
        match self {
            Self::Keyword(color) => format!("kw-{color}"),
            Self::Replaced => "replaced".to_owned(),
        }
    }
}

/// A half-open byte range `[start, end)` into the text it was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    pub class: DisplayClass,
    pub priority: u8,
}

impl MatchSpan {
    pub fn new(range: Range<usize>, class: DisplayClass, priority: u8) -> Self {
        debug_assert!(range.start <= range.end);
        Self {
            start: range.start,
            end: range.end,
            class,
            priority,
        }
    }

    pub fn keyword(range: Range<usize>, index: usize) -> Self {
        Self::new(range, DisplayClass::keyword(index), KEYWORD_PRIORITY)
    }

    pub fn replaced(range: Range<usize>) -> Self {
        Self::new(range, DisplayClass::Replaced, REPLACED_PRIORITY)
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_colours_wrap_around_the_palette() {
        assert_eq!(DisplayClass::keyword(3), DisplayClass::Keyword(3));
        assert_eq!(DisplayClass::keyword(PALETTE_SIZE + 1), DisplayClass::Keyword(1));
    }

    #[test]
    fn replaced_spans_use_the_top_tier() {
        let span = MatchSpan::replaced(4..9);
        assert_eq!(span.priority, REPLACED_PRIORITY);
        assert!(span.priority > MatchSpan::keyword(0..1, 0).priority);
        assert_eq!(span.len(), 5);
        assert_eq!(span.class.css_class(), "replaced");
    }
}
