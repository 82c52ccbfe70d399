//! Crate-wide error type.
//!
//! Every fallible operation in `strata` returns [`Result`], whose error side is
//! the [`Error`] enum below. I/O failures carry a short context string (usually
//! the operation and the path) so messages read like `open data.csv: No such
//! file or directory`.

use std::io;

/// Errors produced by the file layer, the codecs and the CSV reader.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An underlying I/O call failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A caller supplied an argument outside of the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested feature exists but is not built into this binary.
    #[error("not implemented: {0}")]
    Unimplemented(String),

    /// The file handle was used before `open` or after `close`.
    #[error("{0} is not open")]
    NotOpen(&'static str),

    /// Fewer bytes were available than a typed read needed.
    #[error("data loss: {0}")]
    DataLoss(String),

    /// A compression backend rejected its input.
    #[error("{codec} codec error: {message}")]
    Codec { codec: &'static str, message: String },

    /// A CSV row did not have the number of columns the header announced.
    #[error(
        "Line too {}: expected {expected} columns, got {actual}: {row}",
        too_short_or_long(.expected, .actual)
    )]
    RowLength {
        expected: usize,
        actual: usize,
        row: String,
    },

    /// Quote, delimiter and trim characters must be pairwise distinct.
    #[error("quote, delimiter and trim characters overlap: {0:?}")]
    FormatOverlap(Vec<char>),

    /// A named column was requested that the header does not contain.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// JSON encoding of rows or file metadata failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn too_short_or_long(expected: &usize, actual: &usize) -> &'static str {
    if actual < expected { "short" } else { "long" }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn codec(codec: &'static str, message: impl ToString) -> Self {
        Self::Codec {
            codec,
            message: message.to_string(),
        }
    }
}

/// Attach a context string to an `io::Result`, mirroring `anyhow::Context`.
pub(crate) trait IoContext<T> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> IoContext<T> for io::Result<T> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::io(f(), e))
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Self::io("io", source)
    }
}
