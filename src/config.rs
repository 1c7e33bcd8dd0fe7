//! Build configuration, loadable from TOML.
//!
//! ```toml
//! prefix = "/assets/"
//! slot = "main"
//! callback = "allLoaded"
//! prefetch = ["\\.prefetch\\."]
//! data = true
//! ```

use crate::error::{Error, Result};
use crate::fragment::{FragmentOptions, MIN_HASH_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL prefix for every emitted `src` / `href`.
    pub prefix: String,
    /// Patterns selecting JavaScript assets (tested before `css`).
    pub js: Vec<String>,
    pub css: Vec<String>,
    /// Patterns marking JS/CSS assets as prefetch-only.
    pub prefetch: Vec<String>,
    /// File name of the initial fragment.
    pub initial: String,
    pub subsequent: String,
    /// Also emit the fragment data as JSON.
    pub data: bool,
    pub hash_length: usize,
    pub slot: Option<String>,
    pub callback: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            js: vec![r"\.js$".to_owned()],
            css: vec![r"\.css$".to_owned()],
            prefetch: Vec::new(),
            initial: "initial.html".to_owned(),
            subsequent: "subsequent.html".to_owned(),
            data: false,
            hash_length: MIN_HASH_LENGTH,
            slot: None,
            callback: None,
        }
    }
}

/// `initial.html` + `main` -> `initial.main.html`.
fn slotted(file: &str, slot: Option<&str>) -> PathBuf {
    let path = Path::new(file);
    let Some(slot) = slot else {
        return path.to_path_buf();
    };
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{slot}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{slot}"),
    };
    path.with_file_name(name)
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Trimmed slot, `None` when blank.
    pub fn cookie_slot(&self) -> Option<&str> {
        self.slot.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn initial_path(&self) -> PathBuf {
        slotted(&self.initial, self.cookie_slot())
    }

    pub fn subsequent_path(&self) -> PathBuf {
        slotted(&self.subsequent, self.cookie_slot())
    }

    /// `shortbread.json` or `shortbread.<slot>.json`.
    pub fn data_path(&self) -> PathBuf {
        slotted("shortbread.json", self.cookie_slot())
    }

    pub fn fragment_options(&self) -> FragmentOptions {
        FragmentOptions {
            prefix: self.prefix.clone(),
            slot: self.cookie_slot().map(str::to_owned),
            callback: self.callback.clone(),
            hash_length: self.hash_length,
        }
    }
}
