//! String key/value settings persisted as tab-separated lines.

use crate::error::{IoContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// A bag of string properties.
///
/// On disk every property is one `key<TAB>value` line:
///
/// ```
/// use strata::config::PropertySet;
/// # fn main() -> strata::Result<()> {
/// let mut props = PropertySet::default();
/// props.set("codec", "zstd");
/// props.set_value("level", 3);
///
/// let mut saved = Vec::new();
/// props.save_to(&mut saved)?;
/// assert_eq!(saved, b"codec\tzstd\nlevel\t3\n");
///
/// let loaded = PropertySet::load_from(saved.as_slice())?;
/// assert_eq!(loaded.get("level"), Some("3"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertySet {
    properties: HashMap<String, String>,
}

impl PropertySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Store the `Display` form of `value`.
    pub fn set_value<T: Display>(&mut self, key: impl Into<String>, value: T) {
        self.set(key, value.to_string());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The value of `key`, or an empty string.
    #[must_use]
    pub fn get_or_default(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// Parse the value of `key`, `None` if missing or unparsable.
    #[must_use]
    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.parse().ok()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Copy every property of `other` over this set.
    pub fn update_from(&mut self, other: &Self) {
        self.properties
            .extend(other.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Properties sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut entries: Vec<_> = self
            .properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable();
        entries.into_iter()
    }

    /// Read properties from the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::load_from(BufReader::new(file))
    }

    /// Read `key<TAB>value` lines. Blank lines are ignored and lines without
    /// a tab are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub fn load_from(reader: impl BufRead) -> Result<Self> {
        let mut props = Self::default();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.with_context(|| "read properties")?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((key, value)) => props.set(key, value),
                None => {
                    warn!(line = lineno + 1, content = line, "skipping malformed property line");
                }
            }
        }
        Ok(props)
    }

    /// Write the properties to the file at `path`, replacing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.save_to(&mut writer)?;
        writer.flush().with_context(|| format!("flush {}", path.display()))
    }

    /// Write one `key<TAB>value` line per property, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn save_to(&self, mut writer: impl Write) -> Result<()> {
        for (key, value) in self.iter() {
            writeln!(writer, "{key}\t{value}").with_context(|| "write properties")?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
