//! Sectioned key/value configuration
//!
//! Line-oriented format read from the file beside the loaded module:
//!
//! ```text
//! # comment
//! [Paths]
//! python_home_dir = C:\rt
//! ```
//!
//! Keys inside a section are stored as `section.key`. The store is built once
//! per worker run and never mutated afterwards.

pub mod paths;

pub use paths::{EnvExports, PathSet};

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

use crate::errors::{Error, Result};

/// File name looked up in the directory of the loaded module
pub const CONFIG_FILE_NAME: &str = "PyFX.config";

const WHITESPACE: &[char] = &[' ', '\t', '\n', '\r'];

/// Read-only mapping from dotted key to string value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    entries: HashMap<String, String>,
}

impl ConfigStore {
    /// An empty store, used when the configuration file cannot be read
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read(path).map_err(|source| Error::ConfigLoad {
            path: path.to_path_buf(),
            source,
        })?;

        let store = Self::parse(&String::from_utf8_lossy(&content));
        debug!(path = %path.display(), entries = store.len(), "configuration loaded");
        Ok(store)
    }

    /// Parse configuration text. Never fails: unrecognized lines are skipped.
    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        let mut section = String::new();

        for (number, raw) in content.lines().enumerate() {
            let line = raw.trim_matches(WHITESPACE);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].to_string();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                trace!(line = number + 1, "skipping line without '='");
                continue;
            };

            let key = key.trim_matches(WHITESPACE);
            let value = value.trim_matches(WHITESPACE);
            let key = if section.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", section, key)
            };

            entries.insert(key, value.to_string());
        }

        Self { entries }
    }

    /// Stored value for `key`, or `default` when absent
    pub fn get(&self, key: &str, default: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
