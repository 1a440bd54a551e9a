use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::chapters::chapter_text;
use crate::cli::{
    Command, Config, KeywordsAction, ModeAction, OutputFormat, ServeOptions, SettingsAction,
};
use crate::gate::{Gate, GateConfig};
use crate::render::{render_ansi, render_html_document, render_segments, Segment};
use crate::replace::ReplacePair;
use crate::server::{self, ServerConfig};
use crate::session::Session;
use crate::source::{load_text, write_stdout, write_text};
use crate::state::{AppState, Severity};
use crate::store::{DirStore, KeyValueStore};
use crate::ui::{poll_input, Ui, UiEvent};

/// Install the global tracing subscriber. The viewer owns the terminal, so it
/// only logs when a log file is given.
pub fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log filter {:?}", config.log_level))?;
    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None if matches!(config.command, Command::View { .. }) => {}
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}

/// Application runtime: dispatches one command against the persisted session.
pub async fn run(config: Config) -> Result<ExitCode> {
    let store: Arc<dyn KeyValueStore> = Arc::new(DirStore::new(config.data_dir.clone()));
    debug!(data_dir = %config.data_dir.display(), "using preference store");
    match config.command {
        Command::View { path } => view(Session::load(store), path).await,
        Command::Highlight {
            path,
            keywords,
            match_case,
            whole_words,
            format,
        } => {
            let mut session = Session::load(store).detach();
            if !keywords.is_empty() {
                session.clear_keywords();
                for list in &keywords {
                    if let Err(err) = session.add_keywords(list) {
                        return Ok(notice(err));
                    }
                }
            }
            if let Some(enabled) = match_case {
                session.set_match_case(enabled);
            }
            if let Some(enabled) = whole_words {
                session.set_whole_words(enabled);
            }
            highlight(session, &path, format).await
        }
        Command::Replace {
            path,
            mode,
            in_place,
            format,
        } => replace(Session::load(store), &path, mode.as_deref(), in_place, format).await,
        Command::Keywords(action) => Ok(keywords(Session::load(store), action)),
        Command::Mode(action) => Ok(modes(Session::load(store), action)),
        Command::Settings(action) => settings(Session::load(store), action),
        Command::Chapters { path, extract } => chapters(&path, extract.as_deref()).await,
        Command::Serve(options) => serve(options).await,
    }
}

/// A non-fatal outcome the user should see, e.g. "no matches found".
fn notice(message: impl std::fmt::Display) -> ExitCode {
    eprintln!("rtmark: {message}");
    ExitCode::FAILURE
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

async fn emit(
    session: &Session,
    segments: &[Segment<'_>],
    format: OutputFormat,
    json: serde_json::Value,
    summary: String,
) -> Result<()> {
    let out = match format {
        OutputFormat::Ansi => render_ansi(segments),
        OutputFormat::Html => {
            let settings = session.settings();
            render_html_document(segments, &settings.font_family, settings.font_size)
        }
        OutputFormat::Json => serde_json::to_string_pretty(&json)? + "\n",
        OutputFormat::Summary => summary,
    };
    write_stdout(&out).await
}

async fn highlight(session: Session, path: &Path, format: OutputFormat) -> Result<ExitCode> {
    let session = session.with_text(load_text(path).await?);
    let spans = match session.highlight_spans() {
        Ok(spans) => spans,
        Err(err) => return Ok(notice(err)),
    };
    let segments = render_segments(session.text(), &spans);
    let summary: String = session
        .keyword_counts()
        .iter()
        .map(|(word, count)| format!("{word}\t{count}\n"))
        .collect();
    let json = json!({ "spans": spans, "segments": segments });
    emit(&session, &segments, format, json, summary).await?;
    Ok(ExitCode::SUCCESS)
}

async fn replace(
    session: Session,
    path: &Path,
    mode: Option<&str>,
    in_place: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    if in_place && is_stdin(path) {
        bail!("--in-place needs a file path, not stdin");
    }
    let mut session = session.detach().with_text(load_text(path).await?);
    if let Some(name) = mode {
        if let Err(err) = session.activate_mode(name) {
            return Ok(notice(err));
        }
    }
    let count = match session.replace() {
        Ok(count) => count,
        Err(err) => return Ok(notice(format!("nothing replaced: {err}"))),
    };
    info!(count, mode = session.modes().active_name(), "replace pass finished");

    if in_place {
        write_text(path, session.text()).await?;
        eprintln!("rtmark: replaced {count} occurrence(s) in {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }
    let segments = session.replaced_segments();
    let json = json!({
        "text": session.text(),
        "count": count,
        "spans": session.replaced_spans(),
        "segments": segments,
    });
    let summary = format!("replaced {count} occurrence(s)\n");
    emit(&session, &segments, format, json, summary).await?;
    Ok(ExitCode::SUCCESS)
}

fn keywords(mut session: Session, action: KeywordsAction) -> ExitCode {
    match action {
        KeywordsAction::List => {
            if session.keywords().is_empty() {
                println!("no keywords");
            }
            for (i, word) in session.keywords().iter().enumerate() {
                println!("{i}\t{word}");
            }
        }
        KeywordsAction::Add { words } => {
            let mut added = 0;
            for list in &words {
                match session.add_keywords(list) {
                    Ok(n) => added += n,
                    Err(err) => return notice(err),
                }
            }
            println!("added {added} keyword(s)");
        }
        KeywordsAction::Remove { word } => {
            if !session.remove_keyword(&word) {
                return notice(format!("{word:?} is not a keyword"));
            }
        }
        KeywordsAction::Clear => session.clear_keywords(),
    }
    ExitCode::SUCCESS
}

fn print_modes(session: &Session) {
    let book = session.modes();
    for (name, mode) in book.modes() {
        let marker = if name.as_str() == book.active_name() { "*" } else { " " };
        println!(
            "{marker} {name} ({} pair(s), match case {})",
            mode.pairs.len(),
            mode.options.match_case
        );
    }
    for (i, pair) in book.active().pairs.iter().enumerate() {
        println!("  [{i}] {:?} -> {:?}", pair.find, pair.replace);
    }
}

fn modes(mut session: Session, action: ModeAction) -> ExitCode {
    let result = match action {
        ModeAction::List => {
            print_modes(&session);
            Ok(())
        }
        ModeAction::Create { name } => session.create_mode(&name),
        ModeAction::Rename { from, to } => session.rename_mode(&from, &to),
        ModeAction::Delete { name } => session.delete_mode(&name),
        ModeAction::Use { name } => session.activate_mode(&name),
        ModeAction::AddPair { find, replace } => session.add_pair(ReplacePair::new(find, replace)),
        ModeAction::RemovePair { index } => session
            .remove_pair(index)
            .map(|pair| println!("removed {:?} -> {:?}", pair.find, pair.replace)),
        ModeAction::MatchCase { enabled } => {
            session.set_mode_match_case(enabled);
            Ok(())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => notice(err),
    }
}

fn settings(mut session: Session, action: SettingsAction) -> Result<ExitCode> {
    match action {
        SettingsAction::Show => println!("{}", serde_json::to_string_pretty(session.settings())?),
        SettingsAction::MatchCase { enabled } => session.set_match_case(enabled),
        SettingsAction::WholeWords { enabled } => session.set_whole_words(enabled),
        SettingsAction::FontFamily { family } => {
            session.set_font_family(&family);
            println!("font family {}", session.settings().font_family);
        }
        SettingsAction::FontSize { size } => {
            session.set_font_size(size);
            println!("font size {}", session.settings().font_size);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn chapters(path: &Path, extract: Option<&str>) -> Result<ExitCode> {
    let text = load_text(path).await?;
    if let Some(number) = extract {
        return match chapter_text(&text, number) {
            Some(body) => {
                write_stdout(body).await?;
                Ok(ExitCode::SUCCESS)
            }
            None => Ok(notice(format!("no chapter {number}"))),
        };
    }
    let found = Session::new().with_text(text).chapters();
    if found.is_empty() {
        return Ok(notice("no chapter headings found"));
    }
    for chapter in found {
        println!(
            "{}\t{}\t{}..{}",
            chapter.number, chapter.heading, chapter.range.start, chapter.range.end
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn serve(options: ServeOptions) -> Result<ExitCode> {
    let gate = match (options.secrets_dir, options.password) {
        (Some(dir), _) => {
            info!(dir = %dir.display(), "reading the gate password from a secret store");
            let config = GateConfig {
                cookie_ttl_seconds: options.cookie_ttl_seconds,
                ..GateConfig::default()
            };
            Gate::new(Arc::new(DirStore::new(dir)), config)
        }
        (None, Some(password)) => Gate::with_password(&password, options.cookie_ttl_seconds),
        (None, None) => bail!("serve needs --password, RTMARK_PASSWORD or --secrets-dir"),
    };
    server::serve(ServerConfig { addr: options.addr }, gate).await?;
    Ok(ExitCode::SUCCESS)
}

async fn view(session: Session, path: PathBuf) -> Result<ExitCode> {
    if is_stdin(&path) {
        bail!("view needs a file path, not stdin");
    }
    let text = load_text(&path).await?;
    let mut state = AppState::new(session.with_text(text), path);
    let mut ui = Ui::new()?;
    let res = event_loop(&mut ui, &mut state).await;
    // Ensure UI is restored even if error
    let _ = ui.restore();
    res.map(|()| ExitCode::SUCCESS)
}

async fn event_loop(ui: &mut Ui, state: &mut AppState) -> Result<()> {
    let mut last_draw = Instant::now();
    let draw_interval = Duration::from_millis(33); // ~30fps max
    ui.draw(state)?;

    loop {
        let now = Instant::now();
        state.refresh_if_due(now);

        match poll_input(state)? {
            UiEvent::Quit => return Ok(()),
            UiEvent::None => {}
            UiEvent::ScrollUp(n) => state.scroll_up(n),
            UiEvent::ScrollDown(n) => state.scroll_down(n),
            UiEvent::Top => state.scroll_top(),
            UiEvent::Bottom => state.scroll_bottom(),

            UiEvent::TogglePanel => state.toggle_panel(),
            UiEvent::ClosePanel => state.panel_open = false,
            UiEvent::InputChar(c) => state.input.push(c),
            UiEvent::Backspace => {
                state.input.pop();
            }
            UiEvent::AddKeyword => state.add_keyword_from_input(now),
            UiEvent::DeleteKeyword => state.remove_selected_keyword(now),
            UiEvent::ClearKeywords => state.clear_keywords(now),
            UiEvent::FocusNext => state.toggle_focus(),
            UiEvent::SelectUp => state.move_selection_up(),
            UiEvent::SelectDown => state.move_selection_down(),

            UiEvent::ToggleMatchCase => state.toggle_match_case(now),
            UiEvent::ToggleWholeWords => state.toggle_whole_words(now),
            UiEvent::Highlight => state.highlight_now(),
            UiEvent::Replace => state.run_replace(),
            UiEvent::CycleMode => state.cycle_mode(),
            UiEvent::Save => match write_text(&state.path, state.session.text()).await {
                Ok(()) => state.mark_saved(),
                Err(err) => state.notify(Severity::Error, format!("{err:#}")),
            },
        }

        if last_draw.elapsed() >= draw_interval {
            ui.draw(state)?;
            last_draw = Instant::now();
        } else {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::load_settings;
    use tempfile::TempDir;

    fn config(dir: &TempDir, command: Command) -> Config {
        Config {
            data_dir: dir.path().to_path_buf(),
            log_level: "warn".into(),
            log_file: None,
            command,
        }
    }

    #[tokio::test]
    async fn keyword_commands_persist() {
        let dir = TempDir::new().unwrap();
        let add = Command::Keywords(KeywordsAction::Add {
            words: vec!["whale, Ahab".into(), "sea".into()],
        });
        run(config(&dir, add)).await.unwrap();
        let store = DirStore::new(dir.path());
        assert_eq!(load_settings(&store).keywords, "whale,Ahab,sea");

        let remove = Command::Keywords(KeywordsAction::Remove { word: "Ahab".into() });
        run(config(&dir, remove)).await.unwrap();
        assert_eq!(load_settings(&store).keywords, "whale,sea");
    }

    #[tokio::test]
    async fn in_place_replace_uses_the_named_mode() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, "teh cat sat on teh mat").unwrap();

        for action in [
            ModeAction::Create { name: "Typos".into() },
            ModeAction::AddPair {
                find: "teh".into(),
                replace: "the".into(),
            },
            ModeAction::Use { name: "Default".into() },
        ] {
            run(config(&dir, Command::Mode(action))).await.unwrap();
        }

        let replace = Command::Replace {
            path: doc.clone(),
            mode: Some("Typos".into()),
            in_place: true,
            format: OutputFormat::Summary,
        };
        run(config(&dir, replace)).await.unwrap();
        assert_eq!(std::fs::read_to_string(&doc).unwrap(), "the cat sat on the mat");

        // --mode does not change the persisted active mode
        let session = Session::load(Arc::new(DirStore::new(dir.path())));
        assert_eq!(session.modes().active_name(), "Default");
    }

    #[tokio::test]
    async fn in_place_on_stdin_is_refused() {
        let dir = TempDir::new().unwrap();
        let replace = Command::Replace {
            path: PathBuf::from("-"),
            mode: None,
            in_place: true,
            format: OutputFormat::Ansi,
        };
        assert!(run(config(&dir, replace)).await.is_err());
    }

    #[tokio::test]
    async fn serve_requires_a_password_source() {
        let options = ServeOptions {
            addr: "127.0.0.1:0".parse().unwrap(),
            password: None,
            secrets_dir: None,
            cookie_ttl_seconds: 60,
        };
        let err = serve(options).await.unwrap_err();
        assert!(err.to_string().contains("--password"));
    }
}
