use crate::render::{class_rgb, render_segments, Segment};
use crate::span::DisplayClass;
use crate::state::{AppState, PanelFocus, Severity};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use std::io;

pub struct Ui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl Ui {
    pub fn new() -> anyhow::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    pub fn restore(&mut self) -> anyhow::Result<()> {
        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            self.terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    pub fn draw(&mut self, state: &AppState) -> anyhow::Result<()> {
        let segments = render_segments(state.session.text(), &state.spans);
        let lines = segments_to_lines(&segments);
        self.terminal.draw(|frame| {
            let area = frame.area();

            // Document, status line, optional keyword panel
            let mut constraints = vec![Constraint::Min(1), Constraint::Length(2)];
            if state.panel_open {
                constraints.push(Constraint::Length(10));
            }
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints(constraints)
                .split(area);

            let height = chunks[0].height.saturating_sub(2) as usize;
            let visible: Vec<Line> = lines
                .iter()
                .skip(state.scroll)
                .take(height.max(1))
                .cloned()
                .collect();
            let title = format!(
                "{}{} (/:keywords R:replace m:mode s:save q:quit)",
                state.path.display(),
                if state.modified { " [+]" } else { "" },
            );
            let para = Paragraph::new(visible)
                .block(Block::default().borders(Borders::ALL).title(title))
                .wrap(Wrap { trim: false });
            frame.render_widget(para, chunks[0]);

            draw_status(frame, chunks[1], state, lines.len());

            if state.panel_open {
                draw_keyword_panel(frame, chunks[2], state);
            }
        })?;
        Ok(())
    }
}

fn class_style(class: DisplayClass) -> Style {
    let (r, g, b) = class_rgb(class);
    let style = Style::default().fg(Color::Black).bg(Color::Rgb(r, g, b));
    if class.is_replaced() {
        style.add_modifier(Modifier::BOLD)
    } else {
        style
    }
}

/// Split rendered segments into terminal lines, keeping each segment's colour
/// across line breaks.
pub fn segments_to_lines<'a>(segments: &[Segment<'a>]) -> Vec<Line<'a>> {
    let mut lines = vec![Line::default()];
    for segment in segments {
        let style = segment.class().map_or_else(Style::default, class_style);
        for (i, piece) in segment.text().split('\n').enumerate() {
            if i > 0 {
                lines.push(Line::default());
            }
            let piece = piece.strip_suffix('\r').unwrap_or(piece);
            if piece.is_empty() {
                continue;
            }
            if let Some(line) = lines.last_mut() {
                line.spans.push(Span::styled(piece, style));
            }
        }
    }
    lines
}

fn draw_status(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState, total: usize) {
    let settings = state.session.settings();
    let status = format!(
        "Line {}/{}  Mode: {}  Keywords: {}  Spans: {}  i:case={} w:word={}",
        (state.scroll + 1).min(total),
        total,
        state.session.modes().active_name(),
        state.session.keywords().len(),
        state.spans.len(),
        settings.match_case,
        settings.whole_words,
    );
    let mut spans = vec![Span::raw(status)];
    if let Some(notice) = &state.notice {
        let color = match notice.severity {
            Severity::Success => Color::Green,
            Severity::Error => Color::Red,
        };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(notice.text.clone(), Style::default().fg(color)));
    }
    let para = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::TOP))
        .wrap(Wrap { trim: true });
    frame.render_widget(para, area);
}

fn draw_keyword_panel(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let input_title = format!(
        "Add keywords, comma-separated (focus={})",
        match state.focus {
            PanelFocus::Input => "input",
            PanelFocus::List => "list",
        }
    );
    let input = Paragraph::new(state.input.clone())
        .block(Block::default().borders(Borders::ALL).title(input_title));
    frame.render_widget(input, rows[0]);

    let items: Vec<ListItem> = state
        .counts
        .iter()
        .enumerate()
        .map(|(i, (word, count))| {
            let sel = if i == state.selected_keyword && state.focus == PanelFocus::List {
                ">"
            } else {
                " "
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{sel} ")),
                Span::styled(word.clone(), class_style(DisplayClass::keyword(i))),
                Span::raw(format!("  ({count} matches)")),
            ]))
        })
        .collect();
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Keywords (d:delete, c:clear, Tab:switch focus)"),
    );
    frame.render_widget(list, rows[1]);
}

pub enum UiEvent {
    Quit,
    None,
    ScrollUp(usize),
    ScrollDown(usize),
    Top,
    Bottom,

    TogglePanel,
    ClosePanel,
    InputChar(char),
    Backspace,
    AddKeyword,
    DeleteKeyword,
    ClearKeywords,
    FocusNext,
    SelectUp,
    SelectDown,

    ToggleMatchCase,
    ToggleWholeWords,
    Highlight,
    Replace,
    CycleMode,
    Save,
}

pub fn poll_input(state: &AppState) -> anyhow::Result<UiEvent> {
    if event::poll(std::time::Duration::from_millis(10))? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(map_key(state, key.code, key.modifiers));
            }
        }
    }
    Ok(UiEvent::None)
}

fn map_key(state: &AppState, code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
    let typing = state.panel_open && state.focus == PanelFocus::Input;
    let listing = state.panel_open && state.focus == PanelFocus::List;
    let plain = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    match code {
        KeyCode::Char('c') if modifiers == KeyModifiers::CONTROL => UiEvent::Quit,
        KeyCode::Esc if state.panel_open => UiEvent::ClosePanel,
        KeyCode::Esc => UiEvent::Quit,
        KeyCode::Enter if typing => UiEvent::AddKeyword,
        KeyCode::Enter => UiEvent::Highlight,
        KeyCode::Backspace if typing => UiEvent::Backspace,
        KeyCode::Tab if state.panel_open => UiEvent::FocusNext,
        KeyCode::Char(c) if typing && plain => UiEvent::InputChar(c),
        KeyCode::Up if listing => UiEvent::SelectUp,
        KeyCode::Down if listing => UiEvent::SelectDown,
        KeyCode::Char('k') if listing => UiEvent::SelectUp,
        KeyCode::Char('j') if listing => UiEvent::SelectDown,
        KeyCode::Char('d') if listing => UiEvent::DeleteKeyword,
        KeyCode::Char('c') if listing => UiEvent::ClearKeywords,
        KeyCode::Up => UiEvent::ScrollUp(1),
        KeyCode::Down => UiEvent::ScrollDown(1),
        KeyCode::Char('k') => UiEvent::ScrollUp(1),
        KeyCode::Char('j') => UiEvent::ScrollDown(1),
        KeyCode::PageUp => UiEvent::ScrollUp(10),
        KeyCode::PageDown => UiEvent::ScrollDown(10),
        KeyCode::Home => UiEvent::Top,
        KeyCode::End => UiEvent::Bottom,
        KeyCode::Char('q') => UiEvent::Quit,
        KeyCode::Char('/') => UiEvent::TogglePanel,
        KeyCode::Char('i') => UiEvent::ToggleMatchCase,
        KeyCode::Char('w') => UiEvent::ToggleWholeWords,
        KeyCode::Char('R') => UiEvent::Replace,
        KeyCode::Char('m') => UiEvent::CycleMode,
        KeyCode::Char('s') => UiEvent::Save,
        _ => UiEvent::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::span::MatchSpan;
    use rstest::rstest;
    use std::path::PathBuf;

    fn text_of(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn highlights_survive_line_breaks() {
        let text = "one\ntwo words\r\nthree";
        let spans = [MatchSpan::keyword(2..9, 1)];
        let lines = segments_to_lines(&render_segments(text, &spans));
        assert_eq!(lines.len(), 3);
        assert_eq!(text_of(&lines[0]), "one");
        assert_eq!(text_of(&lines[1]), "two words");
        assert_eq!(text_of(&lines[2]), "three");
        let styled = class_style(DisplayClass::keyword(1));
        assert_eq!(lines[0].spans[1].style, styled);
        assert_eq!(lines[1].spans[0].content, "two w");
        assert_eq!(lines[1].spans[0].style, styled);
        assert_eq!(lines[1].spans[1].style, Style::default());
    }

    #[rstest]
    #[case("")]
    #[case("one")]
    #[case("one\n")]
    #[case("one\r\ntwo\n\n")]
    #[case("\n")]
    fn drawn_lines_agree_with_scroll_bounds(#[case] text: &str) {
        let spans = [MatchSpan::keyword(0..text.len(), 0)];
        let lines = segments_to_lines(&render_segments(text, &spans));
        assert_eq!(lines.len(), crate::state::line_count(text));
    }

    #[test]
    fn letters_type_into_the_open_panel() {
        let mut state = AppState::new(Session::new(), PathBuf::from("a.txt"));
        assert!(matches!(
            map_key(&state, KeyCode::Char('R'), KeyModifiers::SHIFT),
            UiEvent::Replace
        ));
        state.toggle_panel();
        assert!(matches!(
            map_key(&state, KeyCode::Char('R'), KeyModifiers::SHIFT),
            UiEvent::InputChar('R')
        ));
        assert!(matches!(
            map_key(&state, KeyCode::Enter, KeyModifiers::NONE),
            UiEvent::AddKeyword
        ));
        state.toggle_focus();
        assert!(matches!(
            map_key(&state, KeyCode::Char('d'), KeyModifiers::NONE),
            UiEvent::DeleteKeyword
        ));
        assert!(matches!(
            map_key(&state, KeyCode::Esc, KeyModifiers::NONE),
            UiEvent::ClosePanel
        ));
    }
}
