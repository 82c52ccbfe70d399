//! Text files read one line at a time.

use crate::error::{Error, IoContext, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Line-oriented reader over a text file.
pub struct ReadlineFile {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    lines: u64,
}

impl ReadlineFile {
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        Ok(Self {
            path,
            reader: Some(BufReader::new(file)),
            lines: 0,
        })
    }

    /// Next line without its `\n` or `\r\n` terminator, or `None` at end of file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed, the read fails or the line is
    /// not UTF-8.
    pub fn readline(&mut self) -> Result<Option<String>> {
        let reader = self.reader.as_mut().ok_or(Error::NotOpen("readline file"))?;
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .with_context(|| format!("read line from {}", self.path.display()))?;
        if n == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        self.lines += 1;
        Ok(Some(line))
    }

    /// Number of lines returned so far.
    #[must_use]
    pub fn lines(&self) -> u64 {
        self.lines
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(&mut self) {
        self.reader = None;
    }
}
