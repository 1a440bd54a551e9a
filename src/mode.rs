//! Named bundles of replace rules, with exactly one active at a time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AnnotateError;
use crate::replace::ReplacePair;

pub const DEFAULT_MODE: &str = "Default";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeOptions {
    #[serde(default)]
    pub match_case: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    #[serde(default)]
    pub pairs: Vec<ReplacePair>,
    #[serde(default)]
    pub options: ModeOptions,
}

/// All modes by name plus the active one. The default mode always exists and
/// can be neither renamed nor deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeBook {
    modes: BTreeMap<String, Mode>,
    active: String,
}

impl Default for ModeBook {
    fn default() -> Self {
        let mut modes = BTreeMap::new();
        modes.insert(DEFAULT_MODE.to_owned(), Mode::default());
        Self {
            modes,
            active: DEFAULT_MODE.to_owned(),
        }
    }
}

impl ModeBook {
    /// Rebuild from persisted parts, restoring the default mode and falling back
    /// to it when the active pointer names nothing.
    pub fn from_parts(modes: BTreeMap<String, Mode>, active: String) -> Self {
        let mut book = Self { modes, active };
        book.modes.entry(DEFAULT_MODE.to_owned()).or_default();
        if !book.modes.contains_key(&book.active) {
            book.active = DEFAULT_MODE.to_owned();
        }
        book
    }

    pub fn modes(&self) -> &BTreeMap<String, Mode> {
        &self.modes
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Mode> {
        self.modes.get(name)
    }

    pub fn active_name(&self) -> &str {
        &self.active
    }

    pub fn active(&self) -> &Mode {
        // from_parts/Default guarantee the active name is present.
        &self.modes[&self.active]
    }

    fn active_mut(&mut self) -> &mut Mode {
        self.modes.entry(self.active.clone()).or_default()
    }

    /// Create an empty mode and make it active.
    pub fn create(&mut self, name: &str) -> Result<(), AnnotateError> {
        let name = valid_name(name)?;
        if self.modes.contains_key(name) {
            return Err(AnnotateError::NameConflict { name: name.to_owned() });
        }
        self.modes.insert(name.to_owned(), Mode::default());
        self.active = name.to_owned();
        info!(mode = name, "created mode");
        Ok(())
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), AnnotateError> {
        if from == DEFAULT_MODE {
            return Err(AnnotateError::ProtectedMode { name: from.to_owned() });
        }
        let to = valid_name(to)?;
        if !self.modes.contains_key(from) {
            return Err(AnnotateError::UnknownMode { name: from.to_owned() });
        }
        if self.modes.contains_key(to) {
            return Err(AnnotateError::NameConflict { name: to.to_owned() });
        }
        if let Some(mode) = self.modes.remove(from) {
            self.modes.insert(to.to_owned(), mode);
        }
        if self.active == from {
            self.active = to.to_owned();
        }
        info!(from, to, "renamed mode");
        Ok(())
    }

    /// Delete a mode; if it was active the default mode takes over.
    pub fn delete(&mut self, name: &str) -> Result<(), AnnotateError> {
        if name == DEFAULT_MODE {
            return Err(AnnotateError::ProtectedMode { name: name.to_owned() });
        }
        if self.modes.remove(name).is_none() {
            return Err(AnnotateError::UnknownMode { name: name.to_owned() });
        }
        if self.active == name {
            self.active = DEFAULT_MODE.to_owned();
        }
        info!(mode = name, "deleted mode");
        Ok(())
    }

    pub fn activate(&mut self, name: &str) -> Result<(), AnnotateError> {
        if !self.modes.contains_key(name) {
            return Err(AnnotateError::UnknownMode { name: name.to_owned() });
        }
        self.active = name.to_owned();
        Ok(())
    }

    /// Activate the mode after the current one, in name order, wrapping around.
    pub fn cycle(&mut self) -> &str {
        let next = self
            .modes
            .range::<str, _>((
                std::ops::Bound::Excluded(self.active.as_str()),
                std::ops::Bound::Unbounded,
            ))
            .next()
            .or_else(|| self.modes.iter().next())
            .map(|(name, _)| name.clone());
        if let Some(next) = next {
            self.active = next;
        }
        &self.active
    }

    /// Append a pair to the active mode.
    pub fn add_pair(&mut self, pair: ReplacePair) -> Result<(), AnnotateError> {
        if pair.is_inert() {
            return Err(AnnotateError::EmptyInput { what: "find term" });
        }
        self.active_mut().pairs.push(pair);
        Ok(())
    }

    /// Remove the pair at `index` from the active mode.
    pub fn remove_pair(&mut self, index: usize) -> Result<ReplacePair, AnnotateError> {
        let pairs = &mut self.active_mut().pairs;
        if index >= pairs.len() {
            return Err(AnnotateError::InvalidIndex { index, len: pairs.len() });
        }
        Ok(pairs.remove(index))
    }

    pub fn set_match_case(&mut self, match_case: bool) {
        self.active_mut().options.match_case = match_case;
    }
}

fn valid_name(name: &str) -> Result<&str, AnnotateError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AnnotateError::EmptyInput { what: "mode name" });
    }
    Ok(name)
}
