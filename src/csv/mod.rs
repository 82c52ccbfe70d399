//! CSV parsing.
//!
//! A [`CsvReader`] reads a file through memory-mapped windows, or any
//! [`std::io::Read`], one chunk at a time. A worker thread parses the next
//! chunk while rows of the previous one are consumed. Rows ([`CsvRow`])
//! are cheap handles into the parsed chunk, and fields ([`CsvField`]) are
//! decoded only when asked for.
//!
//! ```
//! use strata::csv::{parse, CsvFormat};
//! # fn main() -> strata::Result<()> {
//! let rows = parse("name,age\n\"Smith, J\",42\n", CsvFormat::new())?;
//! assert_eq!(rows[0].field("name")?.as_str(), "Smith, J");
//! assert_eq!(rows[0].get(1).and_then(|f| f.as_i64()), Some(42));
//! # Ok(())
//! # }
//! ```
//!
//! The format is described with [`CsvFormat`]. Giving it more than one
//! candidate delimiter makes the reader guess the delimiter and header row
//! from a sample of the input, see [`guess_format`].
//!
//! [`CsvStat`] computes per-column statistics, and [`get_file_info`]
//! summarizes a file in one pass.

mod classify;
mod col_names;
mod data_type;
mod format;
mod parser;
mod queue;
mod reader;
mod row;
mod stats;

pub use classify::{
    make_parse_flags, make_ws_flags, quote_escape_flag, ParseFlag, ParseFlagMap, WhitespaceMap,
};
pub use col_names::ColNames;
pub use data_type::{data_type, DataType};
pub use format::{CsvFormat, GuessResult, VariableColumnPolicy};
pub use parser::ITERATION_CHUNK_SIZE;
pub use reader::{CsvReader, GUESS_HEAD_SIZE};
pub use row::{CsvField, CsvRow};
pub use stats::{csv_data_types, CsvStat, CALC_CHUNK_SIZE};

use crate::error::Result;
use crate::files::MmapSource;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

/// Parse an in-memory CSV document.
///
/// # Errors
///
/// Returns an error if a row is rejected under
/// [`VariableColumnPolicy::Throw`].
pub fn parse(input: &str, format: CsvFormat) -> Result<Vec<CsvRow>> {
    let reader = CsvReader::from_reader(Cursor::new(input.as_bytes().to_vec()), format)?;
    reader.collect()
}

/// Parse an in-memory CSV document that has no header row.
///
/// # Errors
///
/// Never fails in practice; the signature matches [`parse`].
pub fn parse_no_header(input: &str) -> Result<Vec<CsvRow>> {
    parse(input, CsvFormat::new().no_header())
}

/// Guess the delimiter and header row of the file at `path` among `delims`.
///
/// Each candidate is scored by how many fields the most common row length
/// covers in the first [`GUESS_HEAD_SIZE`] bytes. The header is the first
/// row with that length.
///
/// # Errors
///
/// Returns an error if the file cannot be read, or a candidate clashes with
/// the default quote character.
pub fn guess_format(path: impl AsRef<Path>, delims: &[u8]) -> Result<GuessResult> {
    let head = read_head(path.as_ref())?;
    reader::guess_format_bytes(&head, &CsvFormat::new().delimiters(delims)?)
}

/// Column names of the file at `path`, read from the format's header row.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn get_col_names(path: impl AsRef<Path>, format: CsvFormat) -> Result<Vec<String>> {
    let path = path.as_ref();
    let head = read_head(path)?;
    let mut format = format;
    if format.guess_delim() {
        format.apply_guess(reader::guess_format_bytes(&head, &format)?);
    }
    if !format.col_names().is_empty() {
        return Ok(format.col_names().to_vec());
    }
    let Some(header) = format.header() else {
        return Ok(Vec::new());
    };
    let rows = parser::parse_all(&format, head)?;
    Ok(rows.get(header).map(CsvRow::to_vec).unwrap_or_default())
}

/// Position of the column called `name` in the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn get_col_pos(path: impl AsRef<Path>, name: &str, format: CsvFormat) -> Result<Option<usize>> {
    Ok(CsvReader::from_path(path, format)?.index_of(name))
}

/// One-pass summary of a CSV file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvFileInfo {
    pub filename: String,
    pub col_names: Vec<String>,
    pub delim: char,
    pub n_rows: usize,
    pub n_cols: usize,
}

/// Guess the format of the file at `path` and count its rows.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn get_file_info(path: impl AsRef<Path>) -> Result<CsvFileInfo> {
    let path = path.as_ref();
    let mut reader = CsvReader::from_path(path, CsvFormat::guess_csv())?;
    for row in reader.by_ref() {
        row?;
    }
    let format = reader.format();
    let col_names = reader.col_names();
    Ok(CsvFileInfo {
        filename: path.display().to_string(),
        n_cols: col_names.len(),
        col_names,
        delim: char::from(format.delim()?),
        n_rows: reader.n_rows(),
    })
}

fn read_head(path: &Path) -> Result<Bytes> {
    let source = MmapSource::open(path)?;
    let window = source.window(0, GUESS_HEAD_SIZE)?;
    Ok(Bytes::copy_from_slice(&window))
}
