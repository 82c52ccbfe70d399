//! Describes how a CSV file is laid out.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// What the reader does with a row whose length differs from the header's.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableColumnPolicy {
    /// Fail with [`Error::RowLength`].
    Throw,
    /// Drop the row silently.
    #[default]
    IgnoreRow,
    /// Hand the row out exactly as parsed.
    Keep,
}

/// Delimiter and header row inferred from a sample of a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuessResult {
    pub delim: u8,
    pub header_row: usize,
}

/// Builder describing delimiters, quoting, trimming and the header.
///
/// A format with several delimiter candidates makes the reader guess which
/// one the file uses:
///
/// ```
/// use strata::csv::CsvFormat;
/// # fn main() -> strata::Result<()> {
/// let format = CsvFormat::new().delimiter(b'|')?.quote(b'\'')?.header_row(2);
/// assert_eq!(format.delim()?, b'|');
/// assert!(CsvFormat::guess_csv().guess_delim());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsvFormat {
    possible_delimiters: Vec<u8>,
    trim_chars: Vec<u8>,
    header: Option<usize>,
    no_quote: bool,
    quote_char: u8,
    col_names: Vec<String>,
    variable_column_policy: VariableColumnPolicy,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            possible_delimiters: vec![b','],
            trim_chars: Vec::new(),
            header: Some(0),
            no_quote: false,
            quote_char: b'"',
            col_names: Vec::new(),
            variable_column_policy: VariableColumnPolicy::IgnoreRow,
        }
    }
}

impl CsvFormat {
    /// Comma separated, double-quoted, header on the first row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A format that guesses among the common delimiters.
    #[must_use]
    pub fn guess_csv() -> Self {
        Self {
            possible_delimiters: vec![b',', b'|', b'\t', b';', b'^'],
            ..Self::default()
        }
    }

    /// Use a single delimiter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FormatOverlap`] if `delim` is also the quote or a
    /// trim character.
    pub fn delimiter(self, delim: u8) -> Result<Self> {
        self.delimiters(&[delim])
    }

    /// Guess among several delimiters when the reader is constructed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FormatOverlap`] if a candidate is also the quote or a
    /// trim character.
    pub fn delimiters(mut self, delims: &[u8]) -> Result<Self> {
        self.assert_no_char_overlap(delims, &self.trim_chars, self.quote_char)?;
        self.possible_delimiters = delims.to_vec();
        Ok(self)
    }

    /// Characters stripped from both ends of unquoted fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FormatOverlap`] if a trim character is also the quote
    /// or a delimiter.
    pub fn trim(mut self, chars: &[u8]) -> Result<Self> {
        self.assert_no_char_overlap(&self.possible_delimiters, chars, self.quote_char)?;
        self.trim_chars = chars.to_vec();
        Ok(self)
    }

    /// Set the quote character and turn quoting on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FormatOverlap`] if `quote` is a delimiter or trim
    /// character.
    pub fn quote(mut self, quote: u8) -> Result<Self> {
        self.assert_no_char_overlap(&self.possible_delimiters, &self.trim_chars, quote)?;
        self.no_quote = false;
        self.quote_char = quote;
        Ok(self)
    }

    /// Enable or disable quote handling altogether.
    #[must_use]
    pub fn quoting(mut self, enabled: bool) -> Self {
        self.no_quote = !enabled;
        self
    }

    /// Use explicit column names. The file is then assumed to have no header.
    #[must_use]
    pub fn column_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.col_names = names.into_iter().map(Into::into).collect();
        self.header = None;
        self
    }

    /// Row holding the column names; earlier rows are discarded.
    #[must_use]
    pub fn header_row(mut self, row: usize) -> Self {
        self.header = Some(row);
        self.col_names.clear();
        self
    }

    /// The file has no header. Every row is data and rows of any length are
    /// kept.
    #[must_use]
    pub fn no_header(mut self) -> Self {
        self.header = None;
        self.col_names.clear();
        self.variable_column_policy = VariableColumnPolicy::Keep;
        self
    }

    #[must_use]
    pub fn variable_columns(mut self, policy: VariableColumnPolicy) -> Self {
        self.variable_column_policy = policy;
        self
    }

    /// Shorthand for [`VariableColumnPolicy::Keep`] or
    /// [`VariableColumnPolicy::IgnoreRow`].
    #[must_use]
    pub fn keep_variable_columns(self, keep: bool) -> Self {
        self.variable_columns(if keep {
            VariableColumnPolicy::Keep
        } else {
            VariableColumnPolicy::IgnoreRow
        })
    }

    /// The delimiter, when exactly one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] while several candidates remain.
    pub fn delim(&self) -> Result<u8> {
        match self.possible_delimiters.as_slice() {
            [delim] => Ok(*delim),
            _ => Err(Error::InvalidArgument(
                "There is more than one possible delimiter.".into(),
            )),
        }
    }

    #[must_use]
    pub fn possible_delimiters(&self) -> &[u8] {
        &self.possible_delimiters
    }

    /// `None` when quoting is disabled.
    #[must_use]
    pub fn quote_char(&self) -> Option<u8> {
        (!self.no_quote).then_some(self.quote_char)
    }

    #[must_use]
    pub fn is_quoting(&self) -> bool {
        !self.no_quote
    }

    #[must_use]
    pub fn trim_chars(&self) -> &[u8] {
        &self.trim_chars
    }

    #[must_use]
    pub fn header(&self) -> Option<usize> {
        self.header
    }

    #[must_use]
    pub fn col_names(&self) -> &[String] {
        &self.col_names
    }

    #[must_use]
    pub fn variable_column_policy(&self) -> VariableColumnPolicy {
        self.variable_column_policy
    }

    /// Whether the reader has to pick the delimiter itself.
    #[must_use]
    pub fn guess_delim(&self) -> bool {
        self.possible_delimiters.len() > 1
    }

    /// Apply a guess without touching the column names or policy.
    pub(crate) fn apply_guess(&mut self, guess: GuessResult) {
        self.possible_delimiters = vec![guess.delim];
        self.header = Some(guess.header_row);
    }

    /// Record the names the reader resolved, keeping the header row.
    pub(crate) fn set_resolved_names(&mut self, names: Vec<String>) {
        self.col_names = names;
    }

    fn assert_no_char_overlap(&self, delims: &[u8], trims: &[u8], quote: u8) -> Result<()> {
        let mut offending: Vec<u8> = delims.iter().copied().filter(|d| trims.contains(d)).collect();
        if !self.no_quote && (delims.contains(&quote) || trims.contains(&quote)) {
            offending.push(quote);
        }
        offending.sort_unstable();
        offending.dedup();
        if offending.is_empty() {
            return Ok(());
        }
        Err(Error::FormatOverlap(offending.into_iter().map(char::from).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_is_rejected() {
        let err = CsvFormat::new().trim(b" ,").unwrap_err();
        assert!(matches!(err, Error::FormatOverlap(ref chars) if chars == &[',']));

        let err = CsvFormat::new().delimiter(b'"').unwrap_err();
        assert!(matches!(err, Error::FormatOverlap(ref chars) if chars == &['"']));

        // Without quoting the quote character is free to be a delimiter.
        let format = CsvFormat::new().quoting(false).delimiter(b'"').unwrap();
        assert_eq!(format.delim().unwrap(), b'"');
    }

    #[test]
    fn header_and_names_interact() {
        let format = CsvFormat::new().column_names(["a", "b"]);
        assert_eq!(format.header(), None);
        assert_eq!(format.col_names(), ["a", "b"]);

        let format = format.header_row(3);
        assert_eq!(format.header(), Some(3));
        assert!(format.col_names().is_empty());

        let format = CsvFormat::new().no_header();
        assert_eq!(format.variable_column_policy(), VariableColumnPolicy::Keep);
    }

    #[test]
    fn delim_requires_single_candidate() {
        assert!(CsvFormat::guess_csv().delim().is_err());
        assert_eq!(CsvFormat::new().delim().unwrap(), b',');
    }
}
