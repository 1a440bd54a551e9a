use tracing::debug;

use crate::pattern::Pattern;
use crate::span::{DisplayClass, MatchSpan};

/// One pattern to scan for, with the tagging its matches receive.
#[derive(Debug, Clone)]
pub struct PatternSource {
    pub pattern: Pattern,
    pub class: DisplayClass,
    pub priority: u8,
}

impl PatternSource {
    pub fn new(pattern: Pattern, class: DisplayClass, priority: u8) -> Self {
        Self { pattern, class, priority }
    }
}

/// Every occurrence of every source in `text`, unordered across sources.
pub fn collect_matches(text: &str, sources: &[PatternSource]) -> Vec<MatchSpan> {
    let mut spans = Vec::new();
    for source in sources {
        let before = spans.len();
        spans.extend(
            source
                .pattern
                .find_iter(text)
                .map(|range| MatchSpan::new(range, source.class, source.priority)),
        );
        debug!(
            pattern = source.pattern.as_str(),
            matches = spans.len() - before,
            "collected matches"
        );
    }
    spans
}
