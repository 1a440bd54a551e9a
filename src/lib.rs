//! rtmark: keyword highlighting and find/replace for manuscripts.
//!
//! The engine (`pattern` → `collect` → `resolve` → `render`, plus `replace`)
//! is pure and synchronous. `session` ties it to preferences and modes held in
//! a `store`; `app`, `server` and the terminal viewer are thin surfaces on top.

pub mod app;
pub mod chapters;
pub mod cli;
pub mod collect;
pub mod error;
pub mod gate;
pub mod keywords;
pub mod mode;
pub mod pattern;
pub mod render;
pub mod replace;
pub mod resolve;
pub mod server;
pub mod session;
pub mod settings;
pub mod source;
pub mod span;
pub mod state;
pub mod store;
pub mod ui;

pub use error::{AnnotateError, StoreError};
pub use render::Segment;
pub use replace::{apply_replacements, ReplacePair, Replacement};
pub use session::Session;
pub use span::{DisplayClass, MatchSpan};
