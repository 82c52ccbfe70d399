//! Plain descriptor-backed writers.

use super::descriptor::Descriptor;
use super::options::{FileEventListener, OpenOptions};
use super::traits::{FileHandle, RandomWrite, SequentialWrite};
use crate::error::{IoContext, Result};
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::fs::FileExt;
use std::path::Path;

/// A file written front to back.
///
/// Opened in append mode by default; [`SequentialWriteFile::truncate_open`]
/// starts from an empty file instead.
pub struct SequentialWriteFile {
    fd: Descriptor,
    options: OpenOptions,
}

impl SequentialWriteFile {
    /// Open `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, OpenOptions::append_write_default(), FileEventListener::default())
    }

    /// Open `path` for writing, discarding any existing content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn truncate_open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, OpenOptions::truncate_write_default(), FileEventListener::default())
    }

    /// Open `path` with explicit options and lifecycle hooks.
    ///
    /// # Errors
    ///
    /// Returns an error if every open attempt fails.
    pub fn open_with(
        path: impl AsRef<Path>,
        options: OpenOptions,
        listener: FileEventListener,
    ) -> Result<Self> {
        let fd = Descriptor::open(path.as_ref(), &options, listener, "sequential write file")?;
        Ok(Self { fd, options })
    }

    /// Close and open the same path again, optionally truncating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened again.
    pub fn reopen(&mut self, truncate: bool) -> Result<()> {
        let options = OpenOptions {
            append: !truncate,
            truncate,
            ..self.options.clone()
        };
        self.fd.reopen(&options)
    }
}

impl FileHandle for SequentialWriteFile {
    fn path(&self) -> &Path {
        self.fd.path()
    }

    fn size(&self) -> Result<u64> {
        self.fd.size()
    }

    fn close(&mut self) -> Result<()> {
        if self.fd.is_open() {
            self.fd.sync_data()?;
        }
        self.fd.close();
        Ok(())
    }
}

impl SequentialWrite for SequentialWriteFile {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let path = self.fd.path().to_path_buf();
        self.fd
            .file_mut()?
            .write_all(data)
            .with_context(|| format!("write {}", path.display()))
    }

    fn flush(&mut self) -> Result<()> {
        self.fd.sync_data()
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        self.fd.set_len(size)?;
        if !self.options.append {
            let path = self.fd.path().to_path_buf();
            self.fd
                .file_mut()?
                .seek(SeekFrom::End(0))
                .with_context(|| format!("seek {}", path.display()))?;
        }
        Ok(())
    }
}

/// A file written at explicit offsets.
pub struct RandomWriteFile {
    fd: Descriptor,
    options: OpenOptions,
}

impl RandomWriteFile {
    /// Open `path` for positioned writes, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = OpenOptions {
            append: false,
            ..OpenOptions::append_write_default()
        };
        Self::open_with(path, options, FileEventListener::default())
    }

    /// Open `path` with explicit options and lifecycle hooks.
    ///
    /// # Errors
    ///
    /// Returns an error if every open attempt fails.
    pub fn open_with(
        path: impl AsRef<Path>,
        options: OpenOptions,
        listener: FileEventListener,
    ) -> Result<Self> {
        let fd = Descriptor::open(path.as_ref(), &options, listener, "random write file")?;
        Ok(Self { fd, options })
    }

    /// Close and open the same path again, optionally truncating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened again.
    pub fn reopen(&mut self, truncate: bool) -> Result<()> {
        let options = OpenOptions {
            append: false,
            truncate,
            ..self.options.clone()
        };
        self.fd.reopen(&options)
    }
}

impl FileHandle for RandomWriteFile {
    fn path(&self) -> &Path {
        self.fd.path()
    }

    fn size(&self) -> Result<u64> {
        self.fd.size()
    }

    fn close(&mut self) -> Result<()> {
        if self.fd.is_open() {
            self.fd.sync_data()?;
        }
        self.fd.close();
        Ok(())
    }
}

impl RandomWrite for RandomWriteFile {
    fn write_at(&mut self, offset: u64, data: &[u8], truncate: bool) -> Result<()> {
        self.fd
            .file()?
            .write_all_at(data, offset)
            .with_context(|| format!("pwrite {} at {offset}", self.fd.path().display()))?;
        if truncate {
            self.fd.set_len(offset + data.len() as u64)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.fd.sync_data()
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        self.fd.set_len(size)
    }
}
