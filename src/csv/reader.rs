//! Pull-based CSV reading with a background parsing thread.

use super::col_names::ColNames;
use super::format::{CsvFormat, GuessResult, VariableColumnPolicy};
use super::parser::{parse_all, ChunkParser, MmapParser, StreamParser, ITERATION_CHUNK_SIZE};
use super::queue::{RowQueue, NOTIFY_SIZE};
use super::row::CsvRow;
use crate::error::{Error, IoContext, Result};
use crate::files::MmapSource;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Bytes sampled from the start of an input when guessing its format.
pub const GUESS_HEAD_SIZE: usize = 500_000;

type Worker = JoinHandle<(Box<dyn ChunkParser>, Result<()>)>;

/// Reads rows from a file or stream.
///
/// Parsing runs one chunk at a time on a worker thread while the caller
/// consumes rows from the previous chunk. The first chunk is parsed before
/// the constructor returns so the column names are known right away.
///
/// ```
/// use strata::csv::{CsvFormat, CsvReader};
/// # fn main() -> strata::Result<()> {
/// let mut reader = CsvReader::from_reader("a,b\n1,2\n3,4\n".as_bytes(), CsvFormat::new())?;
/// assert_eq!(reader.col_names(), ["a", "b"]);
///
/// let mut total = 0;
/// for row in reader.by_ref() {
///     total += row?.field("b")?.as_i64().unwrap_or(0);
/// }
/// assert_eq!(total, 6);
/// # Ok(())
/// # }
/// ```
pub struct CsvReader {
    format: CsvFormat,
    col_names: Arc<OnceLock<ColNames>>,
    parser: Option<Box<dyn ChunkParser>>,
    worker: Option<Worker>,
    records: Arc<RowQueue<CsvRow>>,
    chunk_size: usize,
    n_cols: usize,
    n_rows: usize,
    utf8_bom: bool,
}

impl CsvReader {
    /// Read a file through memory-mapped windows.
    ///
    /// With several delimiter candidates the delimiter and header row are
    /// guessed from the first [`GUESS_HEAD_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped, or the first
    /// chunk fails to parse.
    pub fn from_path(path: impl AsRef<Path>, format: CsvFormat) -> Result<Self> {
        Self::from_path_with_chunk(path, format, ITERATION_CHUNK_SIZE)
    }

    /// [`CsvReader::from_path`] with a custom number of bytes per chunk.
    ///
    /// # Errors
    ///
    /// See [`CsvReader::from_path`].
    pub fn from_path_with_chunk(
        path: impl AsRef<Path>,
        mut format: CsvFormat,
        chunk_size: usize,
    ) -> Result<Self> {
        let source = MmapSource::open(path)?;
        if format.guess_delim() {
            let head = source.window(0, GUESS_HEAD_SIZE)?;
            let guess = guess_format_bytes(&Bytes::copy_from_slice(&head), &format)?;
            debug!(
                path = %source.path().display(),
                delim = %char::from(guess.delim),
                header = guess.header_row,
                "guessed csv format"
            );
            format.apply_guess(guess);
        }
        Self::with_parser(format, chunk_size, |format, col_names| {
            Ok(Box::new(MmapParser::new(source, format, col_names)?))
        })
    }

    /// Read any byte stream.
    ///
    /// Guessing works here too: the sampled head is replayed in front of the
    /// rest of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the stream fails or the first chunk fails
    /// to parse.
    pub fn from_reader<R: Read + Send + 'static>(reader: R, format: CsvFormat) -> Result<Self> {
        Self::from_reader_with_chunk(reader, format, ITERATION_CHUNK_SIZE)
    }

    /// [`CsvReader::from_reader`] with a custom number of bytes per chunk.
    ///
    /// # Errors
    ///
    /// See [`CsvReader::from_reader`].
    pub fn from_reader_with_chunk<R: Read + Send + 'static>(
        mut reader: R,
        mut format: CsvFormat,
        chunk_size: usize,
    ) -> Result<Self> {
        if !format.guess_delim() {
            return Self::with_parser(format, chunk_size, |format, col_names| {
                Ok(Box::new(StreamParser::new(reader, format, col_names)?))
            });
        }

        let mut head = Vec::with_capacity(GUESS_HEAD_SIZE);
        reader
            .by_ref()
            .take(GUESS_HEAD_SIZE as u64)
            .read_to_end(&mut head)
            .with_context(|| "read csv head")?;
        let head = Bytes::from(head);
        let guess = guess_format_bytes(&head, &format)?;
        debug!(delim = %char::from(guess.delim), header = guess.header_row, "guessed csv format");
        format.apply_guess(guess);

        let replayed = Cursor::new(head).chain(reader);
        Self::with_parser(format, chunk_size, |format, col_names| {
            Ok(Box::new(StreamParser::new(replayed, format, col_names)?))
        })
    }

    fn with_parser<F>(format: CsvFormat, chunk_size: usize, build: F) -> Result<Self>
    where
        F: FnOnce(&CsvFormat, Arc<OnceLock<ColNames>>) -> Result<Box<dyn ChunkParser>>,
    {
        let col_names = Arc::new(OnceLock::new());
        let parser = build(&format, Arc::clone(&col_names))?;
        let mut reader = Self {
            format,
            col_names,
            parser: Some(parser),
            worker: None,
            records: Arc::new(RowQueue::new(NOTIFY_SIZE)),
            chunk_size: chunk_size.max(1),
            n_cols: 0,
            n_rows: 0,
            utf8_bom: false,
        };
        if !reader.format.col_names().is_empty() {
            reader.set_col_names(reader.format.col_names().to_vec());
        }
        reader.initial_read()?;
        Ok(reader)
    }

    fn set_col_names(&mut self, names: Vec<String>) {
        self.n_cols = names.len();
        let _ = self.col_names.set(ColNames::new(names));
    }

    fn initial_read(&mut self) -> Result<()> {
        // The header row, or the first row when there is none, may lie
        // several chunks in.
        let wanted = self.format.header().map_or(1, |header| header + 1);
        loop {
            self.spawn_worker()?;
            self.join_worker()?;
            if self.records.len() >= wanted || self.eof() {
                break;
            }
        }
        if let Some(parser) = &self.parser {
            self.utf8_bom = parser.utf8_bom();
        }
        self.trim_header();
        Ok(())
    }

    /// Drop the rows above the header and take the names from the header row.
    fn trim_header(&mut self) {
        let Some(header) = self.format.header() else {
            return;
        };
        for i in 0..=header {
            let Some(row) = self.records.pop_front() else {
                break;
            };
            if i == header && self.col_names.get().is_none() {
                self.set_col_names(row.to_vec());
            }
        }
    }

    fn spawn_worker(&mut self) -> Result<()> {
        let Some(mut parser) = self.parser.take() else {
            return Ok(());
        };
        let records = Arc::clone(&self.records);
        let chunk_size = self.chunk_size;

        self.records.notify_all();
        let spawned = thread::Builder::new()
            .name("csv-parser".into())
            .spawn(move || {
                let result = parser.next(chunk_size, &records);
                records.kill_all();
                (parser, result)
            });
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.records.kill_all();
                Err(Error::io("spawn csv parser thread", e))
            }
        }
    }

    fn join_worker(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        let (parser, result) = handle
            .join()
            .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
        self.parser = Some(parser);
        result
    }

    /// Next data row, or `None` once the input is exhausted.
    ///
    /// Rows whose length differs from the header's are handled by the
    /// format's [`VariableColumnPolicy`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::RowLength`] for a mismatched row under
    /// [`VariableColumnPolicy::Throw`], or any error from parsing a chunk.
    pub fn read_row(&mut self) -> Result<Option<CsvRow>> {
        loop {
            if let Some(row) = self.records.pop_front() {
                let policy = self.format.variable_column_policy();
                if row.len() != self.n_cols && policy != VariableColumnPolicy::Keep {
                    if policy == VariableColumnPolicy::Throw {
                        return Err(Error::RowLength {
                            expected: self.n_cols,
                            actual: row.len(),
                            row: row.to_string(),
                        });
                    }
                    continue;
                }
                self.n_rows += 1;
                return Ok(Some(row));
            }

            if self.records.is_waitable() {
                self.records.wait();
            } else if self.worker.is_some() {
                self.join_worker()?;
            } else if self.parser.as_ref().is_some_and(|p| !p.eof()) {
                self.spawn_worker()?;
            } else {
                return Ok(None);
            }
        }
    }

    /// The format in use, with guessed values and resolved column names.
    #[must_use]
    pub fn format(&self) -> CsvFormat {
        let mut format = self.format.clone();
        format.set_resolved_names(self.col_names());
        format
    }

    #[must_use]
    pub fn col_names(&self) -> Vec<String> {
        self.col_names
            .get()
            .map(|names| names.names().to_vec())
            .unwrap_or_default()
    }

    /// Position of the column called `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.col_names.get().and_then(|names| names.index_of(name))
    }

    /// Number of data rows returned so far.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Whether the input holds no data rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0 && self.records.is_empty() && self.eof()
    }

    /// Whether the whole input has been parsed. Rows may still be queued.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.worker.is_none() && self.parser.as_ref().is_none_or(|p| p.eof())
    }

    /// Whether the input started with a UTF-8 byte order mark.
    #[must_use]
    pub fn utf8_bom(&self) -> bool {
        self.utf8_bom
    }
}

impl Iterator for CsvReader {
    type Item = Result<CsvRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_row().transpose()
    }
}

impl Drop for CsvReader {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for CsvReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvReader")
            .field("format", &self.format)
            .field("n_rows", &self.n_rows)
            .field("eof", &self.eof())
            .finish_non_exhaustive()
    }
}

/// Score `head` parsed as `format`: the most common row length times its
/// frequency, with the row where that length first appears.
fn calculate_score(head: &Bytes, format: &CsvFormat) -> Result<(usize, usize)> {
    let rows = parse_all(format, head.clone())?;

    // row length -> (count, first row index)
    let mut tally: HashMap<usize, (usize, usize)> = HashMap::new();
    for (i, row) in rows.iter().enumerate().filter(|(_, row)| !row.is_empty()) {
        tally.entry(row.len()).or_insert((0, i)).0 += 1;
    }

    let mut by_first_seen: Vec<_> = tally.into_iter().collect();
    by_first_seen.sort_by_key(|&(_, (_, first))| first);

    let mut best = (0, 0);
    for (len, (count, first)) in by_first_seen {
        let score = len * count;
        if score > best.0 {
            best = (score, first);
        }
    }
    Ok(best)
}

/// Guess the delimiter among `format`'s candidates for the sample `head`.
pub(crate) fn guess_format_bytes(head: &Bytes, format: &CsvFormat) -> Result<GuessResult> {
    let delims = format.possible_delimiters();
    let mut result = GuessResult {
        delim: delims.first().copied().unwrap_or(b','),
        header_row: 0,
    };
    let mut max_score = 0;
    for &delim in delims {
        let candidate = format.clone().delimiter(delim)?;
        let (score, header) = calculate_score(head, &candidate)?;
        if score > max_score {
            max_score = score;
            result = GuessResult {
                delim,
                header_row: header,
            };
        }
    }
    Ok(result)
}
