use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::span::MatchSpan;

/// Reduce candidate spans to an ordered, non-overlapping list.
///
/// Within one priority tier candidates are swept by start, longest first, and a
/// candidate is accepted only if it does not collide with anything accepted
/// before it; losers are dropped whole, never trimmed. Tiers are swept from the
/// highest priority down, so a replaced-range marker is never displaced by a
/// keyword match, even one that starts earlier. With a single tier this is the
/// plain left-to-right cursor sweep.
///
/// Zero-width candidates are discarded. The result does not depend on the order
/// of `candidates`.
pub fn resolve_overlaps(mut candidates: Vec<MatchSpan>) -> Vec<MatchSpan> {
    candidates.retain(|s| !s.is_empty());
    candidates.sort_by_key(|s| (Reverse(s.priority), s.start, Reverse(s.end)));

    // start -> accepted span; accepted spans never overlap, so starts are unique.
    let mut accepted: BTreeMap<usize, MatchSpan> = BTreeMap::new();
    for span in candidates {
        let blocked = accepted
            .range(..span.end)
            .next_back()
            .is_some_and(|(_, prev)| prev.end > span.start);
        if !blocked {
            accepted.insert(span.start, span);
        }
    }
    accepted.into_values().collect()
}
