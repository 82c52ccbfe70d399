//! Rows and fields handed out by the reader.
//!
//! Rows never copy field bytes. Each one holds a shared handle on the chunk
//! it was parsed from plus the span table of its fields, so a chunk is
//! released as soon as its last row is dropped.

use super::col_names::ColNames;
use super::data_type::{data_type, DataType};
use crate::error::{Error, Result};
use crate::files::MmapWindow;
use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Storage behind a chunk: an owned buffer from a stream or a mapped window.
pub(crate) enum ChunkBytes {
    Heap(Bytes),
    Mapped(MmapWindow),
}

impl AsRef<[u8]> for ChunkBytes {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Heap(bytes) => bytes,
            Self::Mapped(window) => window,
        }
    }
}

/// One parsed chunk of input.
pub(crate) struct RawCsvData {
    bytes: ChunkBytes,
    quote: Option<u8>,
    col_names: Arc<OnceLock<ColNames>>,
}

impl RawCsvData {
    pub(crate) fn new(
        bytes: ChunkBytes,
        quote: Option<u8>,
        col_names: Arc<OnceLock<ColNames>>,
    ) -> Self {
        Self {
            bytes,
            quote,
            col_names,
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }
}

/// Span of a field, relative to the start of its row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RawField {
    pub start: usize,
    pub len: usize,
    pub has_double_quote: bool,
}

/// A parsed CSV row. Cloning is cheap.
#[derive(Clone)]
pub struct CsvRow {
    data: Arc<RawCsvData>,
    fields: Arc<[RawField]>,
    data_start: usize,
    fields_start: usize,
    row_length: usize,
}

impl CsvRow {
    pub(crate) fn new(
        data: Arc<RawCsvData>,
        fields: Arc<[RawField]>,
        data_start: usize,
        fields_start: usize,
        row_length: usize,
    ) -> Self {
        Self {
            data,
            fields,
            data_start,
            fields_start,
            row_length,
        }
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.row_length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_length == 0
    }

    /// Field at position `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<CsvField<'_>> {
        (index < self.row_length).then(|| self.field_at(index))
    }

    fn field_at(&self, index: usize) -> CsvField<'_> {
        let raw = self.fields[self.fields_start + index];
        let start = self.data_start + raw.start;
        CsvField {
            bytes: self.data.bytes().get(start..start + raw.len).unwrap_or_default(),
            has_double_quote: raw.has_double_quote,
            quote: self.data.quote,
        }
    }

    /// Field in the column called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if no column has that name or this
    /// row is too short to reach it.
    pub fn field(&self, name: &str) -> Result<CsvField<'_>> {
        self.col_names()
            .and_then(|names| names.index_of(name))
            .and_then(|i| self.get(i))
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    /// Column names of the reader this row came from, `None` without a header.
    #[must_use]
    pub fn col_names(&self) -> Option<&ColNames> {
        self.data.col_names.get()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = CsvField<'_>> + '_ {
        (0..self.row_length).map(|i| self.field_at(i))
    }

    /// Owned copies of every field, with escaped quotes collapsed.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(|f| f.as_str().into_owned()).collect()
    }

    /// The row as a JSON object keyed by column name.
    ///
    /// Only the columns in `subset` are emitted, or all of them when it is
    /// empty. Numeric fields are written as JSON numbers. A row without
    /// column names is keyed by position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] for a name this row cannot resolve.
    pub fn to_json(&self, subset: &[&str]) -> Result<String> {
        let mut out = String::from("{");
        for (n, (key, field)) in self.selected(subset)?.into_iter().enumerate() {
            if n > 0 {
                out.push(',');
            }
            out.push_str(&serde_json::to_string(&key)?);
            out.push(':');
            field.write_json(&mut out)?;
        }
        out.push('}');
        Ok(out)
    }

    /// Like [`CsvRow::to_json`] but emits only the values, as an array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] for a name this row cannot resolve.
    pub fn to_json_array(&self, subset: &[&str]) -> Result<String> {
        let mut out = String::from("[");
        for (n, (_, field)) in self.selected(subset)?.into_iter().enumerate() {
            if n > 0 {
                out.push(',');
            }
            field.write_json(&mut out)?;
        }
        out.push(']');
        Ok(out)
    }

    fn selected(&self, subset: &[&str]) -> Result<Vec<(Cow<'_, str>, CsvField<'_>)>> {
        if !subset.is_empty() {
            return subset
                .iter()
                .map(|&name| Ok((Cow::Owned(name.to_string()), self.field(name)?)))
                .collect();
        }
        match self.col_names().filter(|names| !names.is_empty()) {
            Some(names) => names
                .names()
                .iter()
                .map(|name| Ok((Cow::Borrowed(name.as_str()), self.field(name)?)))
                .collect(),
            None => Ok(self
                .iter()
                .enumerate()
                .map(|(i, field)| (Cow::Owned(i.to_string()), field))
                .collect()),
        }
    }
}

impl fmt::Debug for CsvRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|field| field.as_str())).finish()
    }
}

/// Fields joined by `", "`, as used in row length errors.
impl fmt::Display for CsvRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&field.as_str())?;
        }
        Ok(())
    }
}

impl PartialEq for CsvRow {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.as_bytes() == b.as_bytes())
    }
}

impl<'a> IntoIterator for &'a CsvRow {
    type Item = CsvField<'a>;
    type IntoIter = Box<dyn ExactSizeIterator<Item = CsvField<'a>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// A borrowed view of one field.
#[derive(Clone, Copy, Debug)]
pub struct CsvField<'a> {
    bytes: &'a [u8],
    has_double_quote: bool,
    quote: Option<u8>,
}

impl<'a> CsvField<'a> {
    /// Raw bytes as they appear in the input, escaped quotes included.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Text of the field with doubled quotes collapsed. Borrows unless
    /// collapsing or lossy UTF-8 decoding forces a copy.
    #[must_use]
    pub fn as_str(&self) -> Cow<'a, str> {
        let text = String::from_utf8_lossy(self.bytes);
        match self.quote {
            Some(quote) if self.has_double_quote => Cow::Owned(unescape(&text, char::from(quote))),
            _ => text,
        }
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        data_type(&self.as_str()).0
    }

    /// The value as a float, for any numeric field.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        data_type(&self.as_str()).1
    }

    /// The value as an integer, for integral fields that fit `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        let text = self.as_str();
        match data_type(&text).0 {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                text.trim().parse().ok()
            }
            _ => None,
        }
    }

    /// `true`/`false` in any case, or `1`/`0`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        let text = self.as_str();
        let text = text.trim();
        if text.eq_ignore_ascii_case("true") || text == "1" {
            Some(true)
        } else if text.eq_ignore_ascii_case("false") || text == "0" {
            Some(false)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_num(&self) -> bool {
        self.data_type().is_num()
    }

    #[must_use]
    pub fn is_int(&self) -> bool {
        self.data_type().is_int()
    }

    #[must_use]
    pub fn is_float(&self) -> bool {
        self.data_type() == DataType::Double
    }

    #[must_use]
    pub fn is_str(&self) -> bool {
        self.data_type() == DataType::String
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.data_type() == DataType::Null
    }

    fn write_json(&self, out: &mut String) -> Result<()> {
        let text = self.as_str();
        let value = match data_type(&text) {
            (DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64, _) => {
                text.trim().parse::<i64>().map(serde_json::Value::from).ok()
            }
            (DataType::BigInt | DataType::Double, Some(x)) => {
                serde_json::Number::from_f64(x).map(serde_json::Value::Number)
            }
            _ => None,
        };
        match value {
            Some(number) => out.push_str(&number.to_string()),
            None => out.push_str(&serde_json::to_string(text.as_ref())?),
        }
        Ok(())
    }
}

impl PartialEq<str> for CsvField<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for CsvField<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for CsvField<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// Collapse every doubled `quote` into one.
fn unescape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_quote = false;
    for ch in text.chars() {
        if prev_quote && ch == quote {
            prev_quote = false;
            continue;
        }
        prev_quote = ch == quote;
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_collapses_pairs() {
        assert_eq!(unescape(r#"He said ""hi"""#, '"'), r#"He said "hi""#);
        assert_eq!(unescape("\"\"\"\"", '"'), "\"\"");
        assert_eq!(unescape("plain", '"'), "plain");
    }
}
