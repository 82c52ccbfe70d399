//! The CSV state machine and the sources feeding it.
//!
//! [`BasicParser`] turns one chunk of bytes into rows. It never copies field
//! bytes: a field is a `(start, len)` span relative to its row, and rows are
//! published to the queue in batches sharing one frozen span table. The
//! trailing incomplete row of a chunk is left alone and its offset returned,
//! so the source can start the next chunk there.

use super::classify::{
    make_parse_flags, make_ws_flags, quote_escape_flag, ParseFlag, ParseFlagMap, WhitespaceMap,
};
use super::col_names::ColNames;
use super::format::CsvFormat;
use super::queue::{RowQueue, NOTIFY_SIZE};
use super::row::{ChunkBytes, CsvRow, RawCsvData, RawField};
use crate::error::{IoContext, Result};
use crate::files::MmapSource;
use bytes::Bytes;
use std::io::Read;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Bytes parsed per worker run.
pub const ITERATION_CHUNK_SIZE: usize = 10_000_000;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A source of chunks driven by the reader's worker thread.
pub(crate) trait ChunkParser: Send {
    /// Parse roughly `bytes` more input, pushing every complete row to `out`.
    fn next(&mut self, bytes: usize, out: &RowQueue<CsvRow>) -> Result<()>;

    /// Whether the whole input has been parsed.
    fn eof(&self) -> bool;

    /// Whether the input started with a UTF-8 byte order mark.
    fn utf8_bom(&self) -> bool;
}

struct PendingRow {
    data_start: usize,
    fields_start: usize,
    len: usize,
}

pub(crate) struct BasicParser {
    parse_flags: ParseFlagMap,
    ws_flags: WhitespaceMap,
    quote: Option<u8>,
    col_names: Arc<OnceLock<ColNames>>,

    // Spans not yet frozen into a shared block, and the rows using them.
    fields: Vec<RawField>,
    pending: Vec<PendingRow>,

    row_start: usize,
    row_fields_start: usize,
    field_start: Option<usize>,
    field_length: usize,
    field_has_double_quote: bool,
    quote_escape: bool,
    data_pos: usize,

    unicode_bom_scanned: bool,
    utf8_bom: bool,
}

impl BasicParser {
    pub(crate) fn new(format: &CsvFormat, col_names: Arc<OnceLock<ColNames>>) -> Result<Self> {
        let quote = format.quote_char();
        Ok(Self {
            parse_flags: make_parse_flags(format.delim()?, quote),
            ws_flags: make_ws_flags(format.trim_chars()),
            quote,
            col_names,
            fields: Vec::new(),
            pending: Vec::new(),
            row_start: 0,
            row_fields_start: 0,
            field_start: None,
            field_length: 0,
            field_has_double_quote: false,
            quote_escape: false,
            data_pos: 0,
            unicode_bom_scanned: false,
            utf8_bom: false,
        })
    }

    pub(crate) fn chunk(&self, bytes: ChunkBytes) -> Arc<RawCsvData> {
        Arc::new(RawCsvData::new(bytes, self.quote, Arc::clone(&self.col_names)))
    }

    pub(crate) fn utf8_bom(&self) -> bool {
        self.utf8_bom
    }

    pub(crate) fn reset_field(&mut self) {
        self.field_start = None;
        self.field_length = 0;
        self.field_has_double_quote = false;
    }

    #[inline]
    fn raw_flag(&self, b: u8) -> ParseFlag {
        self.parse_flags[usize::from(b)]
    }

    #[inline]
    fn compound_flag(&self, b: u8) -> ParseFlag {
        quote_escape_flag(self.raw_flag(b), self.quote_escape)
    }

    #[inline]
    fn is_ws(&self, b: u8) -> bool {
        self.ws_flags[usize::from(b)]
    }

    /// Parse every complete row of `chunk` and return the offset where the
    /// incomplete trailing row begins.
    pub(crate) fn parse(&mut self, chunk: &Arc<RawCsvData>, out: &RowQueue<CsvRow>) -> usize {
        let data = chunk.bytes();
        self.quote_escape = false;
        self.data_pos = 0;
        self.row_start = 0;
        self.row_fields_start = 0;
        self.fields.clear();
        self.pending.clear();
        self.trim_utf8_bom(data);

        while self.data_pos < data.len() {
            match self.compound_flag(data[self.data_pos]) {
                ParseFlag::Delimiter => {
                    self.push_field();
                    self.data_pos += 1;
                }
                ParseFlag::Newline => {
                    self.data_pos += 1;
                    // CRLF and LFLF end the row together.
                    if data
                        .get(self.data_pos)
                        .is_some_and(|&b| self.raw_flag(b) == ParseFlag::Newline)
                    {
                        self.data_pos += 1;
                    }
                    self.push_field();
                    self.push_row(chunk, out);
                }
                ParseFlag::NotSpecial => self.parse_field(data),
                ParseFlag::QuoteEscapeQuote => {
                    // Trim characters may sit between a closing quote and the
                    // delimiter.
                    let mut after = self.data_pos + 1;
                    while after < data.len() && self.is_ws(data[after]) {
                        after += 1;
                    }
                    let Some(&next) = data.get(after) else {
                        // The closing quote may be followed by more input.
                        break;
                    };
                    let next = self.raw_flag(next);
                    if next >= ParseFlag::Delimiter {
                        self.quote_escape = false;
                        self.data_pos = after;
                    } else if next == ParseFlag::Quote && after == self.data_pos + 1 {
                        self.data_pos += 2;
                        self.field_length += 2;
                        self.field_has_double_quote = true;
                    } else {
                        self.open_quote_or_literal(data);
                    }
                }
                ParseFlag::Quote => self.open_quote_or_literal(data),
            }
        }

        self.flush_rows(chunk, out);
        self.row_start
    }

    /// Finish the input: the final row may lack a trailing newline.
    pub(crate) fn end_feed(&mut self, chunk: &Arc<RawCsvData>, out: &RowQueue<CsvRow>) {
        let empty_last_field = chunk
            .bytes()
            .last()
            .is_some_and(|&b| matches!(self.raw_flag(b), ParseFlag::Delimiter | ParseFlag::Quote));

        if self.field_length > 0 || empty_last_field {
            self.push_field();
        }
        if self.fields.len() > self.row_fields_start {
            self.push_row(chunk, out);
        }
        self.flush_rows(chunk, out);
    }

    fn trim_utf8_bom(&mut self, data: &[u8]) {
        if !self.unicode_bom_scanned && data.len() >= UTF8_BOM.len() {
            if data.starts_with(UTF8_BOM) {
                // The first row starts after the mark, so a re-read of an
                // unfinished first row resumes past it too.
                self.data_pos += UTF8_BOM.len();
                self.row_start = self.data_pos;
                self.utf8_bom = true;
            }
            self.unicode_bom_scanned = true;
        }
    }

    fn open_quote_or_literal(&mut self, data: &[u8]) {
        if self.field_length == 0 {
            self.quote_escape = true;
            self.data_pos += 1;
            if self.field_start.is_none()
                && data.get(self.data_pos).is_some_and(|&b| !self.is_ws(b))
            {
                self.field_start = Some(self.data_pos - self.row_start);
            }
        } else {
            self.field_length += 1;
            self.data_pos += 1;
        }
    }

    fn parse_field(&mut self, data: &[u8]) {
        while self.data_pos < data.len() && self.is_ws(data[self.data_pos]) {
            self.data_pos += 1;
        }

        // Leading trim characters before an opening quote.
        if self.field_start.is_none()
            && self.field_length == 0
            && data
                .get(self.data_pos)
                .is_some_and(|&b| self.compound_flag(b) == ParseFlag::Quote)
        {
            return;
        }

        let field_start = *self.field_start.get_or_insert(self.data_pos - self.row_start);

        while self.data_pos < data.len()
            && self.compound_flag(data[self.data_pos]) == ParseFlag::NotSpecial
        {
            self.data_pos += 1;
        }

        self.field_length = self.data_pos - (field_start + self.row_start);

        let mut end = self.data_pos;
        while self.field_length > 0 && end > 0 && self.is_ws(data[end - 1]) {
            end -= 1;
            self.field_length -= 1;
        }
    }

    fn push_field(&mut self) {
        self.fields.push(RawField {
            start: self.field_start.unwrap_or(0),
            len: self.field_length,
            has_double_quote: self.field_has_double_quote,
        });
        self.reset_field();
    }

    fn push_row(&mut self, chunk: &Arc<RawCsvData>, out: &RowQueue<CsvRow>) {
        self.pending.push(PendingRow {
            data_start: self.row_start,
            fields_start: self.row_fields_start,
            len: self.fields.len() - self.row_fields_start,
        });
        self.row_start = self.data_pos;
        self.row_fields_start = self.fields.len();
        if self.pending.len() >= NOTIFY_SIZE {
            self.flush_rows(chunk, out);
        }
    }

    /// Freeze the spans of every finished row and publish those rows. Spans
    /// of the row in progress stay behind.
    fn flush_rows(&mut self, chunk: &Arc<RawCsvData>, out: &RowQueue<CsvRow>) {
        if self.pending.is_empty() {
            return;
        }
        let in_progress = self.fields.split_off(self.row_fields_start);
        let block: Arc<[RawField]> = std::mem::replace(&mut self.fields, in_progress).into();
        self.row_fields_start = 0;
        out.extend(self.pending.drain(..).map(|row| {
            CsvRow::new(
                Arc::clone(chunk),
                Arc::clone(&block),
                row.data_start,
                row.fields_start,
                row.len,
            )
        }));
    }
}

/// Parse `data` in one go as a complete input.
pub(crate) fn parse_all(format: &CsvFormat, data: Bytes) -> Result<Vec<CsvRow>> {
    let mut parser = BasicParser::new(format, Arc::new(OnceLock::new()))?;
    let chunk = parser.chunk(ChunkBytes::Heap(data));
    let out = RowQueue::new(usize::MAX);
    parser.parse(&chunk, &out);
    parser.end_feed(&chunk, &out);
    Ok(std::iter::from_fn(|| out.pop_front()).collect())
}

/// Parses any [`Read`] by copying it into owned chunks.
pub(crate) struct StreamParser<R> {
    core: BasicParser,
    source: R,
    leftover: Bytes,
    eof: bool,
}

impl<R: Read + Send> StreamParser<R> {
    pub(crate) fn new(
        source: R,
        format: &CsvFormat,
        col_names: Arc<OnceLock<ColNames>>,
    ) -> Result<Self> {
        Ok(Self {
            core: BasicParser::new(format, col_names)?,
            source,
            leftover: Bytes::new(),
            eof: false,
        })
    }
}

impl<R: Read + Send> ChunkParser for StreamParser<R> {
    fn next(&mut self, bytes: usize, out: &RowQueue<CsvRow>) -> Result<()> {
        self.core.reset_field();

        let mut buf = Vec::with_capacity(self.leftover.len() + bytes);
        buf.extend_from_slice(&self.leftover);
        let wanted = u64::try_from(bytes).unwrap_or(u64::MAX);
        let read = self
            .source
            .by_ref()
            .take(wanted)
            .read_to_end(&mut buf)
            .with_context(|| "read csv stream")?;
        if (read as u64) < wanted {
            self.eof = true;
        }

        let buf = Bytes::from(buf);
        let chunk = self.core.chunk(ChunkBytes::Heap(buf.clone()));
        let remainder = self.core.parse(&chunk, out);
        debug!(chunk_len = buf.len(), remainder, eof = self.eof, "parsed csv stream chunk");

        if self.eof {
            self.core.end_feed(&chunk, out);
            self.leftover = Bytes::new();
        } else {
            self.leftover = buf.slice(remainder..);
        }
        Ok(())
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn utf8_bom(&self) -> bool {
        self.core.utf8_bom()
    }
}

/// Parses a file through a window mapped fresh for every chunk.
pub(crate) struct MmapParser {
    core: BasicParser,
    source: MmapSource,
    mmap_pos: u64,
    // Window multiplier, doubled while a single row outgrows the window.
    grow: usize,
    eof: bool,
}

impl MmapParser {
    pub(crate) fn new(
        source: MmapSource,
        format: &CsvFormat,
        col_names: Arc<OnceLock<ColNames>>,
    ) -> Result<Self> {
        Ok(Self {
            core: BasicParser::new(format, col_names)?,
            source,
            mmap_pos: 0,
            grow: 1,
            eof: false,
        })
    }
}

impl ChunkParser for MmapParser {
    fn next(&mut self, bytes: usize, out: &RowQueue<CsvRow>) -> Result<()> {
        self.core.reset_field();

        let window = self.source.window(self.mmap_pos, bytes.saturating_mul(self.grow))?;
        let end = self.mmap_pos + window.len() as u64;
        let chunk = self.core.chunk(ChunkBytes::Mapped(window));
        let remainder = self.core.parse(&chunk, out);
        debug!(offset = self.mmap_pos, end, remainder, "parsed csv mmap chunk");

        if end >= self.source.len() {
            self.eof = true;
            self.core.end_feed(&chunk, out);
            self.mmap_pos = end;
        } else {
            self.grow = if remainder == 0 { self.grow.saturating_mul(2) } else { 1 };
            self.mmap_pos += remainder as u64;
        }
        Ok(())
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn utf8_bom(&self) -> bool {
        self.core.utf8_bom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(format: &CsvFormat, input: &str) -> Vec<Vec<String>> {
        parse_all(format, Bytes::copy_from_slice(input.as_bytes()))
            .unwrap()
            .iter()
            .map(CsvRow::to_vec)
            .collect()
    }

    #[test]
    fn splits_rows_and_fields() {
        let format = CsvFormat::new();
        assert_eq!(
            rows(&format, "a,b,c\r\n1,2,3\n4,5,6"),
            vec![vec!["a", "b", "c"], vec!["1", "2", "3"], vec!["4", "5", "6"]]
        );
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_newlines() {
        let format = CsvFormat::new();
        assert_eq!(
            rows(&format, "\"x,y\",\"line\nbreak\",\"He said \"\"hi\"\"\"\n"),
            vec![vec!["x,y", "line\nbreak", "He said \"hi\""]]
        );
    }

    #[test]
    fn trailing_delimiter_yields_empty_field() {
        let format = CsvFormat::new();
        assert_eq!(rows(&format, "a,b,"), vec![vec!["a", "b", ""]]);
        assert_eq!(rows(&format, "a,,c\n"), vec![vec!["a", "", "c"]]);
    }

    #[test]
    fn trim_chars_are_stripped() {
        let format = CsvFormat::new().trim(b" \t").unwrap();
        assert_eq!(rows(&format, "  a \t,\t b  \n"), vec![vec!["a", "b"]]);
    }

    #[test]
    fn trim_chars_around_quoted_fields() {
        let format = CsvFormat::new().trim(b" ").unwrap();
        assert_eq!(rows(&format, "  \"a, b\"  , c \n"), vec![vec!["a, b", "c"]]);
    }

    #[test]
    fn byte_order_mark_is_skipped() {
        let format = CsvFormat::new();
        let parsed = parse_all(&format, Bytes::from_static(b"\xEF\xBB\xBFa,b\n1,2\n")).unwrap();
        assert_eq!(parsed[0].to_vec(), vec!["a", "b"]);
    }

    #[test]
    fn incomplete_first_row_resumes_after_byte_order_mark() {
        let format = CsvFormat::new();
        let mut parser = BasicParser::new(&format, Arc::new(OnceLock::new())).unwrap();
        let chunk = parser.chunk(ChunkBytes::Heap(Bytes::from_static(b"\xEF\xBB\xBFna")));
        let out = RowQueue::new(usize::MAX);
        assert_eq!(parser.parse(&chunk, &out), 3);
        assert!(parser.utf8_bom());
        assert!(out.is_empty());
    }

    #[test]
    fn quoting_can_be_disabled() {
        let format = CsvFormat::new().quoting(false);
        assert_eq!(rows(&format, "\"a\",b\n"), vec![vec!["\"a\"", "b"]]);
    }

    #[test]
    fn parse_returns_start_of_incomplete_row() {
        let format = CsvFormat::new();
        let mut parser = BasicParser::new(&format, Arc::new(OnceLock::new())).unwrap();
        let chunk = parser.chunk(ChunkBytes::Heap(Bytes::from_static(b"a,b\nc,d\ne,")));
        let out = RowQueue::new(usize::MAX);
        assert_eq!(parser.parse(&chunk, &out), 8);
        assert_eq!(std::iter::from_fn(|| out.pop_front()).count(), 2);
    }
}
