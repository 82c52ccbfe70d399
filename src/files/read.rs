//! Plain descriptor-backed readers.

use super::descriptor::Descriptor;
use super::options::{FileEventListener, OpenOptions};
use super::traits::{FileHandle, RandomRead, SequentialRead};
use crate::error::{IoContext, Result};
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::fs::FileExt;
use std::path::Path;

/// A file read front to back through a cursor.
///
/// ```no_run
/// use strata::files::{SequentialRead, SequentialReadFile};
/// # fn main() -> strata::Result<()> {
/// let mut file = SequentialReadFile::open("data.bin")?;
/// let mut head = Vec::new();
/// file.read_to_vec(&mut head, Some(16))?;
/// # Ok(())
/// # }
/// ```
pub struct SequentialReadFile {
    fd: Descriptor,
    position: u64,
}

impl SequentialReadFile {
    /// Open `path` for reading with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &OpenOptions::read_default(), FileEventListener::default())
    }

    /// Open `path` with explicit options and lifecycle hooks.
    ///
    /// # Errors
    ///
    /// Returns an error if every open attempt fails.
    pub fn open_with(
        path: impl AsRef<Path>,
        options: &OpenOptions,
        listener: FileEventListener,
    ) -> Result<Self> {
        let fd = Descriptor::open(path.as_ref(), options, listener, "sequential read file")?;
        Ok(Self { fd, position: 0 })
    }

    /// Read the rest of the file as UTF-8, appending to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the data is not UTF-8.
    pub fn read_to_string(&mut self, out: &mut String) -> Result<usize> {
        let path = self.fd.path().to_path_buf();
        let n = self
            .fd
            .file_mut()?
            .read_to_string(out)
            .with_context(|| format!("read {}", path.display()))?;
        self.position += n as u64;
        Ok(n)
    }
}

impl FileHandle for SequentialReadFile {
    fn path(&self) -> &Path {
        self.fd.path()
    }

    fn size(&self) -> Result<u64> {
        self.fd.size()
    }

    fn close(&mut self) -> Result<()> {
        self.fd.close();
        Ok(())
    }
}

impl SequentialRead for SequentialReadFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let path = self.fd.path().to_path_buf();
        let n = Read::read(self.fd.file_mut()?, buf)
            .with_context(|| format!("read {}", path.display()))?;
        self.position += n as u64;
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        let path = self.fd.path().to_path_buf();
        let offset = i64::try_from(n).unwrap_or(i64::MAX);
        self.position = self
            .fd
            .file_mut()?
            .seek(SeekFrom::Current(offset))
            .with_context(|| format!("seek {}", path.display()))?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// A file read with `pread`, safe to share between threads.
pub struct RandomReadFile {
    fd: Descriptor,
}

impl RandomReadFile {
    /// Open `path` for positioned reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &OpenOptions::read_default(), FileEventListener::default())
    }

    /// Open `path` with explicit options and lifecycle hooks.
    ///
    /// # Errors
    ///
    /// Returns an error if every open attempt fails.
    pub fn open_with(
        path: impl AsRef<Path>,
        options: &OpenOptions,
        listener: FileEventListener,
    ) -> Result<Self> {
        let fd = Descriptor::open(path.as_ref(), options, listener, "random read file")?;
        Ok(Self { fd })
    }
}

impl FileHandle for RandomReadFile {
    fn path(&self) -> &Path {
        self.fd.path()
    }

    fn size(&self) -> Result<u64> {
        self.fd.size()
    }

    fn close(&mut self) -> Result<()> {
        self.fd.close();
        Ok(())
    }
}

impl RandomRead for RandomReadFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.fd
            .file()?
            .read_at(buf, offset)
            .with_context(|| format!("pread {} at {offset}", self.fd.path().display()))
    }
}
