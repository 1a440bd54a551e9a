use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::gate::DEFAULT_COOKIE_TTL_SECONDS;

/// Immutable configuration used by the application runtime
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Ansi,
    Html,
    Json,
    /// Counts only, no document text
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    View { path: PathBuf },
    Highlight {
        path: PathBuf,
        keywords: Vec<String>,
        match_case: Option<bool>,
        whole_words: Option<bool>,
        format: OutputFormat,
    },
    Replace {
        path: PathBuf,
        mode: Option<String>,
        in_place: bool,
        format: OutputFormat,
    },
    Keywords(KeywordsAction),
    Mode(ModeAction),
    Settings(SettingsAction),
    Chapters { path: PathBuf, extract: Option<String> },
    Serve(ServeOptions),
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum KeywordsAction {
    /// Show the saved keywords
    List,
    /// Add keywords (each argument may be a comma-separated list)
    Add {
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Remove one keyword
    Remove { word: String },
    /// Remove all keywords
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ModeAction {
    /// Show all modes and the pairs of the active one
    List,
    /// Create a mode and make it active
    Create { name: String },
    Rename { from: String, to: String },
    Delete { name: String },
    /// Make a mode active
    Use { name: String },
    /// Append a find/replace pair to the active mode
    AddPair { find: String, replace: String },
    /// Remove the pair at INDEX (as shown by `mode list`) from the active mode
    RemovePair { index: usize },
    /// Set case-sensitive replacement for the active mode
    MatchCase {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum SettingsAction {
    Show,
    MatchCase {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    WholeWords {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    FontFamily { family: String },
    FontSize { size: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, ClapArgs)]
pub struct ServeOptions {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    /// Gate password (kept in memory only)
    #[arg(long, env = "RTMARK_PASSWORD", hide_env_values = true, conflicts_with = "secrets_dir")]
    pub password: Option<String>,

    /// Directory-backed secret store holding the `password` key; re-read on every request
    #[arg(long, value_name = "DIR")]
    pub secrets_dir: Option<PathBuf>,

    /// Session cookie lifetime in seconds
    #[arg(long = "cookie-ttl", value_name = "SECS", default_value_t = DEFAULT_COOKIE_TTL_SECONDS)]
    pub cookie_ttl_seconds: u64,
}

/// User-facing CLI arguments (kept private to the CLI layer)
#[derive(Parser, Debug)]
#[command(name = "rtmark", version, about = "Keyword highlighting and find/replace for manuscripts")]
struct Args {
    /// Where preferences and modes are stored
    #[arg(long, global = true, env = "RTMARK_DATA_DIR", default_value = ".rtmark")]
    data_dir: PathBuf,

    /// Log filter, e.g. `info` or `rtmark=debug`
    #[arg(long, global = true, env = "RTMARK_LOG", default_value = "warn")]
    log_level: String,

    /// Write logs to this file instead of stderr (required for logs in `view`)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: ArgsCommand,
}

#[derive(Subcommand, Debug)]
enum ArgsCommand {
    /// Open a document in the interactive viewer
    View {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Print a document with keywords highlighted
    Highlight {
        /// Document to read, `-` for stdin
        #[arg(value_name = "PATH")]
        path: PathBuf,
        /// Keywords to use instead of the saved list (repeatable, comma-separated)
        #[arg(short = 'k', long = "keyword")]
        keywords: Vec<String>,
        #[arg(long, overrides_with = "ignore_case")]
        match_case: bool,
        #[arg(long)]
        ignore_case: bool,
        #[arg(short = 'w', long, overrides_with = "substrings")]
        whole_words: bool,
        #[arg(long)]
        substrings: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Ansi)]
        format: OutputFormat,
    },
    /// Apply the active mode's find/replace pairs to a document
    Replace {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        /// Use this mode instead of the active one
        #[arg(long)]
        mode: Option<String>,
        /// Write the result back to PATH
        #[arg(short = 'i', long)]
        in_place: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Ansi)]
        format: OutputFormat,
    },
    /// Manage the saved keyword list
    #[command(subcommand)]
    Keywords(KeywordsAction),
    /// Manage replace modes
    #[command(subcommand)]
    Mode(ModeAction),
    /// Show or change display and matching preferences
    #[command(subcommand)]
    Settings(SettingsAction),
    /// List chapter headings, or print one chapter
    Chapters {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        #[arg(long, value_name = "NUMBER")]
        extract: Option<String>,
    },
    /// Serve the JSON API behind the password gate
    Serve(ServeOptions),
}

fn flag(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn into_config(args: Args) -> Config {
    let command = match args.command {
        ArgsCommand::View { path } => Command::View { path },
        ArgsCommand::Highlight {
            path,
            keywords,
            match_case,
            ignore_case,
            whole_words,
            substrings,
            format,
        } => Command::Highlight {
            path,
            keywords,
            match_case: flag(match_case, ignore_case),
            whole_words: flag(whole_words, substrings),
            format,
        },
        ArgsCommand::Replace {
            path,
            mode,
            in_place,
            format,
        } => Command::Replace {
            path,
            mode,
            in_place,
            format,
        },
        ArgsCommand::Keywords(action) => Command::Keywords(action),
        ArgsCommand::Mode(action) => Command::Mode(action),
        ArgsCommand::Settings(action) => Command::Settings(action),
        ArgsCommand::Chapters { path, extract } => Command::Chapters { path, extract },
        ArgsCommand::Serve(options) => Command::Serve(options),
    };
    Config {
        data_dir: args.data_dir,
        log_level: args.log_level,
        log_file: args.log_file,
        command,
    }
}

/// Parse CLI options into an application Config
pub fn parse() -> Config {
    into_config(Args::parse())
}
