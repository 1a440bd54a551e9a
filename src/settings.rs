use serde::{Deserialize, Serialize};

use crate::replace::ReplacePair;

pub const DEFAULT_FONT_FAMILY: &str = "Georgia, serif";
pub const DEFAULT_FONT_SIZE: u16 = 16;
pub const MIN_FONT_SIZE: u16 = 8;
pub const MAX_FONT_SIZE: u16 = 72;

/// The flat display/matching preferences record.
///
/// Keywords are kept in their comma-joined persisted form; `replace_pairs`
/// mirrors the active mode's pairs at the time of the last save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub match_case: bool,
    pub whole_words: bool,
    pub keywords: String,
    pub replace_pairs: Vec<ReplacePair>,
    pub font_family: String,
    pub font_size: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            match_case: false,
            whole_words: false,
            keywords: String::new(),
            replace_pairs: Vec::new(),
            font_family: DEFAULT_FONT_FAMILY.to_owned(),
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl Settings {
    pub fn set_font_size(&mut self, size: u16) {
        self.font_size = size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
    }

    pub fn set_font_family(&mut self, family: &str) {
        let family = family.trim();
        self.font_family = if family.is_empty() {
            DEFAULT_FONT_FAMILY.to_owned()
        } else {
            family.to_owned()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"match_case": true}"#).unwrap();
        assert!(settings.match_case);
        assert_eq!(settings.font_size, DEFAULT_FONT_SIZE);
        assert_eq!(settings.font_family, DEFAULT_FONT_FAMILY);
    }

    #[test]
    fn font_settings_are_sanitised() {
        let mut settings = Settings::default();
        settings.set_font_size(400);
        assert_eq!(settings.font_size, MAX_FONT_SIZE);
        settings.set_font_family("   ");
        assert_eq!(settings.font_family, DEFAULT_FONT_FAMILY);
    }
}
