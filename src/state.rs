use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::error::AnnotateError;
use crate::session::Session;
use crate::span::MatchSpan;

/// Quiet period after the last keyword edit before highlights are recomputed.
pub const HIGHLIGHT_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    Input,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub severity: Severity,
}

/// Number of display lines in `text`. A trailing newline opens one more empty
/// line, matching how the viewer splits segments.
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

pub struct AppState {
    pub session: Session,
    pub path: PathBuf,
    // Resolved spans for the current buffer, refreshed after edits settle
    pub spans: Vec<MatchSpan>,
    // Occurrences per keyword, in keyword order
    pub counts: Vec<(String, usize)>,
    // Index of the first visible line
    pub scroll: usize,
    pub panel_open: bool,
    pub focus: PanelFocus,
    pub input: String,
    pub selected_keyword: usize,
    pub notice: Option<Notice>,
    // Buffer differs from the file on disk
    pub modified: bool,
    dirty_since: Option<Instant>,
}

impl AppState {
    pub fn new(session: Session, path: PathBuf) -> Self {
        let mut state = Self {
            session,
            path,
            spans: Vec::new(),
            counts: Vec::new(),
            scroll: 0,
            panel_open: false,
            focus: PanelFocus::Input,
            input: String::new(),
            selected_keyword: 0,
            notice: None,
            modified: false,
            dirty_since: None,
        };
        let _ = state.recompute();
        state
    }

    pub fn line_count(&self) -> usize {
        line_count(self.session.text())
    }

    pub fn notify(&mut self, severity: Severity, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            severity,
        });
    }

    fn notify_error(&mut self, err: &AnnotateError) {
        self.notify(Severity::Error, err.to_string());
    }

    /// Schedule a highlight refresh once edits go quiet.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty_since = Some(now);
    }

    /// Recompute highlights if the debounce period has elapsed. Returns whether it did.
    pub fn refresh_if_due(&mut self, now: Instant) -> bool {
        match self.dirty_since {
            Some(since) if now.duration_since(since) >= HIGHLIGHT_DEBOUNCE => {
                self.dirty_since = None;
                let _ = self.recompute();
                true
            }
            _ => false,
        }
    }

    /// Recompute highlights now. On failure the previous highlights are cleared.
    pub fn recompute(&mut self) -> Result<(), AnnotateError> {
        self.counts = self.session.keyword_counts();
        match self.session.highlight_spans() {
            Ok(spans) => {
                self.spans = spans;
                Ok(())
            }
            Err(err) => {
                self.spans.clear();
                Err(err)
            }
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        let max = self.line_count().saturating_sub(1);
        self.scroll = (self.scroll + n).min(max);
    }

    pub fn scroll_top(&mut self) {
        self.scroll = 0;
    }

    pub fn scroll_bottom(&mut self) {
        self.scroll = self.line_count().saturating_sub(1);
    }

    pub fn toggle_panel(&mut self) {
        self.panel_open = !self.panel_open;
        self.focus = PanelFocus::Input;
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            PanelFocus::Input => PanelFocus::List,
            PanelFocus::List => PanelFocus::Input,
        };
    }

    pub fn add_keyword_from_input(&mut self, now: Instant) {
        let input = std::mem::take(&mut self.input);
        match self.session.add_keywords(&input) {
            Ok(0) => self.notify(Severity::Error, format!("{:?} is already a keyword", input.trim())),
            Ok(n) => {
                self.notify(Severity::Success, format!("added {n} keyword(s)"));
                self.mark_dirty(now);
            }
            Err(err) => self.notify_error(&err),
        }
    }

    pub fn remove_selected_keyword(&mut self, now: Instant) {
        let Some(word) = self.session.keywords().get(self.selected_keyword).map(str::to_owned) else {
            return;
        };
        self.session.remove_keyword(&word);
        let len = self.session.keywords().len();
        if self.selected_keyword >= len && len > 0 {
            self.selected_keyword = len - 1;
        }
        self.notify(Severity::Success, format!("removed {word:?}"));
        self.mark_dirty(now);
    }

    pub fn clear_keywords(&mut self, now: Instant) {
        self.session.clear_keywords();
        self.selected_keyword = 0;
        self.notify(Severity::Success, "cleared all keywords");
        self.mark_dirty(now);
    }

    pub fn move_selection_up(&mut self) {
        self.selected_keyword = self.selected_keyword.saturating_sub(1);
    }

    pub fn move_selection_down(&mut self) {
        let len = self.session.keywords().len();
        if self.selected_keyword + 1 < len {
            self.selected_keyword += 1;
        }
    }

    pub fn toggle_match_case(&mut self, now: Instant) {
        let next = !self.session.settings().match_case;
        self.session.set_match_case(next);
        self.mark_dirty(now);
    }

    pub fn toggle_whole_words(&mut self, now: Instant) {
        let next = !self.session.settings().whole_words;
        self.session.set_whole_words(next);
        self.mark_dirty(now);
    }

    pub fn cycle_mode(&mut self) {
        let name = self.session.cycle_mode();
        let pairs = self.session.modes().active().pairs.len();
        self.notify(Severity::Success, format!("mode {name:?} ({pairs} pair(s))"));
    }

    /// Run the active mode's replace pass and highlight what changed immediately.
    pub fn run_replace(&mut self) {
        match self.session.replace() {
            Ok(count) => {
                self.modified = true;
                self.notify(Severity::Success, format!("replaced {count} occurrence(s)"));
            }
            Err(AnnotateError::NoMatch) => self.notify(Severity::Error, "nothing replaced: no matches found"),
            Err(err) => self.notify(Severity::Error, format!("nothing replaced: {err}")),
        }
        self.dirty_since = None;
        let _ = self.recompute();
        self.scroll = self.scroll.min(self.line_count().saturating_sub(1));
    }

    /// Explicit refresh: recompute now and report the outcome.
    pub fn highlight_now(&mut self) {
        self.dirty_since = None;
        match self.recompute() {
            Ok(()) => {
                let n = self.spans.len();
                self.notify(Severity::Success, format!("{n} highlighted span(s)"));
            }
            Err(err) => self.notify_error(&err),
        }
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
        let path = self.path.display().to_string();
        self.notify(Severity::Success, format!("saved {path}"));
    }
}
