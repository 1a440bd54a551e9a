//! The single editing session: one text buffer plus everything that decides
//! how it is highlighted and rewritten.
//!
//! All state lives here rather than in globals so that each surface (CLI,
//! terminal viewer, tests) owns exactly one explicit context. Every preference
//! change is written through to the store immediately; write failures are
//! logged and otherwise ignored.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::chapters::{extract_chapters, Chapter};
use crate::collect::{collect_matches, PatternSource};
use crate::error::AnnotateError;
use crate::keywords::KeywordSet;
use crate::mode::ModeBook;
use crate::pattern::{build_pattern, MatchOptions};
use crate::render::{render_segments, Segment};
use crate::replace::{apply_replacements, ReplacePair};
use crate::resolve::resolve_overlaps;
use crate::settings::Settings;
use crate::span::MatchSpan;
use crate::store::{self, KeyValueStore};

pub struct Session {
    text: String,
    keywords: KeywordSet,
    modes: ModeBook,
    settings: Settings,
    replaced: Vec<MatchSpan>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session with default preferences that persists nothing.
    pub fn new() -> Self {
        Self {
            text: String::new(),
            keywords: KeywordSet::new(),
            modes: ModeBook::default(),
            settings: Settings::default(),
            replaced: Vec::new(),
            store: None,
        }
    }

    /// Restore preferences and modes from `store` and write changes back to it.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let settings = store::load_settings(store.as_ref());
        let modes = store::load_modes(store.as_ref()).unwrap_or_else(|| {
            // Seed the default mode from the flat record's pairs.
            let mut book = ModeBook::default();
            for pair in settings.replace_pairs.iter().filter(|p| !p.is_inert()) {
                let _ = book.add_pair(pair.clone());
            }
            book.set_match_case(settings.match_case);
            book
        });
        let keywords = KeywordSet::from_joined(&settings.keywords);
        debug!(
            keywords = keywords.len(),
            mode = modes.active_name(),
            "loaded session preferences"
        );
        Self {
            text: String::new(),
            keywords,
            modes,
            settings,
            replaced: Vec::new(),
            store: Some(store),
        }
    }

    /// Stop writing changes through, e.g. for one-off overrides from the command line.
    pub fn detach(mut self) -> Self {
        self.store = None;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the buffer. Replaced-range markers refer to the old text and are dropped.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.replaced.clear();
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn modes(&self) -> &ModeBook {
        &self.modes
    }

    pub fn replaced_spans(&self) -> &[MatchSpan] {
        &self.replaced
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions::new(self.settings.match_case, self.settings.whole_words)
    }

    pub fn add_keyword(&mut self, word: &str) -> Result<bool, AnnotateError> {
        let added = self.keywords.add(word)?;
        if added {
            self.persist();
        }
        Ok(added)
    }

    /// Add a comma-separated list of keywords; returns how many were new.
    pub fn add_keywords(&mut self, list: &str) -> Result<usize, AnnotateError> {
        let added = self.keywords.add_all(list)?;
        if added > 0 {
            self.persist();
        }
        Ok(added)
    }

    pub fn remove_keyword(&mut self, word: &str) -> bool {
        let removed = self.keywords.remove(word);
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear_keywords(&mut self) {
        self.keywords.clear();
        self.persist();
    }

    pub fn set_match_case(&mut self, match_case: bool) {
        self.settings.match_case = match_case;
        self.persist();
    }

    pub fn set_whole_words(&mut self, whole_words: bool) {
        self.settings.whole_words = whole_words;
        self.persist();
    }

    pub fn set_font_family(&mut self, family: &str) {
        self.settings.set_font_family(family);
        self.persist();
    }

    pub fn set_font_size(&mut self, size: u16) {
        self.settings.set_font_size(size);
        self.persist();
    }

    pub fn create_mode(&mut self, name: &str) -> Result<(), AnnotateError> {
        self.modes.create(name)?;
        self.persist();
        Ok(())
    }

    pub fn rename_mode(&mut self, from: &str, to: &str) -> Result<(), AnnotateError> {
        self.modes.rename(from, to)?;
        self.persist();
        Ok(())
    }

    pub fn delete_mode(&mut self, name: &str) -> Result<(), AnnotateError> {
        self.modes.delete(name)?;
        self.persist();
        Ok(())
    }

    pub fn activate_mode(&mut self, name: &str) -> Result<(), AnnotateError> {
        self.modes.activate(name)?;
        self.persist();
        Ok(())
    }

    pub fn cycle_mode(&mut self) -> String {
        let name = self.modes.cycle().to_owned();
        self.persist();
        name
    }

    pub fn add_pair(&mut self, pair: ReplacePair) -> Result<(), AnnotateError> {
        self.modes.add_pair(pair)?;
        self.persist();
        Ok(())
    }

    pub fn remove_pair(&mut self, index: usize) -> Result<ReplacePair, AnnotateError> {
        let pair = self.modes.remove_pair(index)?;
        self.persist();
        Ok(pair)
    }

    pub fn set_mode_match_case(&mut self, match_case: bool) {
        self.modes.set_match_case(match_case);
        self.persist();
    }

    /// Resolved highlight spans for the current buffer: keyword matches plus
    /// the markers left by the last replace pass.
    pub fn highlight_spans(&self) -> Result<Vec<MatchSpan>, AnnotateError> {
        if self.keywords.is_empty() && self.replaced.is_empty() {
            return Err(AnnotateError::EmptyInput { what: "keywords" });
        }
        let sources: Vec<PatternSource> = self.keywords.sources(self.match_options());
        let mut candidates = collect_matches(&self.text, &sources);
        candidates.extend_from_slice(&self.replaced);
        if candidates.is_empty() {
            return Err(AnnotateError::NoMatch);
        }
        let spans = resolve_overlaps(candidates);
        debug!(spans = spans.len(), "resolved highlight spans");
        Ok(spans)
    }

    pub fn annotate(&self) -> Result<Vec<Segment<'_>>, AnnotateError> {
        let spans = self.highlight_spans()?;
        Ok(render_segments(&self.text, &spans))
    }

    /// Run the active mode's pairs over the buffer. On success the buffer holds
    /// the rewritten text and the replaced ranges are kept for highlighting; on
    /// failure the buffer is untouched and the replaced ranges are cleared.
    pub fn replace(&mut self) -> Result<usize, AnnotateError> {
        let mode = self.modes.active();
        match apply_replacements(&self.text, &mode.pairs, mode.options.match_case) {
            Ok(replacement) => {
                self.text = replacement.text;
                self.replaced = replacement.spans;
                Ok(replacement.count)
            }
            Err(err) => {
                self.replaced.clear();
                Err(err)
            }
        }
    }

    /// Replaced ranges only, for the "show what changed" pass.
    pub fn replaced_segments(&self) -> Vec<Segment<'_>> {
        render_segments(&self.text, &resolve_overlaps(self.replaced.clone()))
    }

    pub fn chapters(&self) -> Vec<Chapter> {
        extract_chapters(&self.text)
    }

    /// Number of keyword occurrences per keyword, in keyword order.
    pub fn keyword_counts(&self) -> Vec<(String, usize)> {
        let options = self.match_options();
        // Counted per word so a term that fails to compile reads 0 in its own row.
        self.keywords
            .iter()
            .map(|word| {
                let count = build_pattern(word, options).map_or(0, |p| p.find_iter(&self.text).count());
                (word.to_owned(), count)
            })
            .collect()
    }

    fn persist(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        self.settings.keywords = self.keywords.joined();
        self.settings.replace_pairs = self.modes.active().pairs.clone();
        if let Err(err) = store::save_settings(store.as_ref(), &self.settings) {
            warn!(error = %err, "could not save settings");
        }
        if let Err(err) = store::save_modes(store.as_ref(), &self.modes) {
            warn!(error = %err, "could not save modes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::join_segments;
    use crate::store::MemoryStore;
    use rstest::rstest;

    fn session_with(text: &str, keywords: &str) -> Session {
        let mut session = Session::new().with_text(text);
        if !keywords.is_empty() {
            session.add_keywords(keywords).unwrap();
        }
        session
    }

    #[test]
    fn no_keywords_is_empty_input() {
        let session = session_with("some text", "");
        assert_eq!(
            session.highlight_spans(),
            Err(AnnotateError::EmptyInput { what: "keywords" })
        );
    }

    #[test]
    fn no_occurrences_is_no_match() {
        let session = session_with("some text", "whale");
        assert_eq!(session.highlight_spans(), Err(AnnotateError::NoMatch));
    }

    #[rstest]
    #[case(false, false, 3)]
    #[case(true, false, 1)]
    #[case(false, true, 2)]
    fn flags_drive_keyword_matching(
        #[case] match_case: bool,
        #[case] whole_words: bool,
        #[case] expected: usize,
    ) {
        let mut session = session_with("Sea seashell SEA", "Sea");
        session.set_match_case(match_case);
        session.set_whole_words(whole_words);
        assert_eq!(session.highlight_spans().unwrap().len(), expected);
    }

    #[test]
    fn replace_then_highlight_shows_replaced_ranges_first() {
        let mut session = session_with("a a a", "bb");
        session.add_pair(ReplacePair::new("a", "bb")).unwrap();
        assert_eq!(session.replace(), Ok(3));
        assert_eq!(session.text(), "bb bb bb");

        let spans = session.highlight_spans().unwrap();
        assert_eq!(spans.len(), 3);
        assert!(spans.iter().all(|s| s.class.is_replaced()));
        assert_eq!(
            spans.iter().map(MatchSpan::range).collect::<Vec<_>>(),
            vec![0..2, 3..5, 6..8]
        );
    }

    #[test]
    fn failed_replace_resets_markers_and_keeps_text() {
        let mut session = session_with("a a", "");
        session.add_pair(ReplacePair::new("a", "b")).unwrap();
        session.replace().unwrap();
        assert!(!session.replaced_spans().is_empty());

        assert_eq!(session.replace(), Err(AnnotateError::NoMatch));
        assert_eq!(session.text(), "b b");
        assert!(session.replaced_spans().is_empty());
    }

    #[test]
    fn inert_pairs_leave_text_alone() {
        let mut session = session_with("unchanged", "");
        assert_eq!(
            session.replace(),
            Err(AnnotateError::EmptyInput { what: "replace pairs" })
        );
        assert_eq!(session.text(), "unchanged");
    }

    #[test]
    fn editing_the_buffer_drops_replaced_markers() {
        let mut session = session_with("a", "");
        session.add_pair(ReplacePair::new("a", "b")).unwrap();
        session.replace().unwrap();
        session.set_text("b and more");
        assert!(session.replaced_spans().is_empty());
    }

    #[test]
    fn only_the_active_mode_is_applied() {
        let mut session = session_with("colour", "");
        session.create_mode("A").unwrap();
        session.add_pair(ReplacePair::new("colour", "color")).unwrap();
        session.create_mode("B").unwrap();
        assert_eq!(
            session.replace(),
            Err(AnnotateError::EmptyInput { what: "replace pairs" })
        );
        assert_eq!(session.text(), "colour");
        session.activate_mode("A").unwrap();
        assert_eq!(session.replace(), Ok(1));
        assert_eq!(session.text(), "color");
    }

    #[test]
    fn mode_match_case_governs_replace() {
        let mut session = session_with("Teh teh", "");
        session.add_pair(ReplacePair::new("teh", "the")).unwrap();
        session.set_mode_match_case(true);
        assert_eq!(session.replace(), Ok(1));
        assert_eq!(session.text(), "Teh the");
    }

    #[test]
    fn annotation_is_lossless() {
        let text = "Call me Ishmael. Some years ago, never mind how long.";
        let session = session_with(text, "me,Ishmael,year,long");
        let segments = session.annotate().unwrap();
        assert_eq!(join_segments(&segments), text);
        assert!(segments.iter().any(|s| s.class().is_some()));
    }

    #[test]
    fn preferences_persist_across_sessions() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        {
            let mut session = Session::load(store.clone());
            session.add_keywords("whale, Ahab").unwrap();
            session.set_whole_words(true);
            session.create_mode("Proofing").unwrap();
            session.add_pair(ReplacePair::new("teh", "the")).unwrap();
            session.set_font_size(22);
        }
        let session = Session::load(store);
        assert_eq!(session.keywords().joined(), "whale,Ahab");
        assert!(session.settings().whole_words);
        assert_eq!(session.settings().font_size, 22);
        assert_eq!(session.modes().active_name(), "Proofing");
        assert_eq!(session.modes().active().pairs, vec![ReplacePair::new("teh", "the")]);
    }

    #[test]
    fn flat_record_pairs_seed_the_default_mode() {
        let mut settings = Settings::default();
        settings.replace_pairs = vec![ReplacePair::new("x", "y"), ReplacePair::default()];
        let store = MemoryStore::new();
        store::save_settings(&store, &settings).unwrap();

        let session = Session::load(Arc::new(store));
        assert_eq!(session.modes().active().pairs, vec![ReplacePair::new("x", "y")]);
    }

    #[test]
    fn keyword_counts_follow_keyword_order() {
        let session = session_with("the cat sat on the mat", "the,at,dog");
        assert_eq!(
            session.keyword_counts(),
            vec![("the".into(), 2), ("at".into(), 3), ("dog".into(), 0)]
        );
    }
}
