//! Memory-mapped read access.
//!
//! [`MmapReadFile`] maps a whole file once and serves both positioned reads
//! and a sequential cursor from the mapping. [`MmapSource`] maps arbitrary
//! byte windows of a file on demand, which is what the CSV reader uses to walk
//! large inputs without mapping them in full.

use super::descriptor::Descriptor;
use super::options::{FileEventListener, OpenOptions};
use super::traits::{FileHandle, RandomRead, SequentialRead};
use crate::error::{Error, IoContext, Result};
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Map `len` bytes of `file` starting at `offset`. Zero-length windows map to
/// `None` since an empty mapping is not portable.
fn map_window(file: &File, path: &Path, offset: u64, len: usize) -> Result<Option<Mmap>> {
    if len == 0 {
        return Ok(None);
    }
    // SAFETY: the mapping is read-only; callers must not truncate the file
    // while it is mapped.
    let map = unsafe { MmapOptions::new().offset(offset).len(len).map(file) }
        .with_context(|| format!("mmap {} [{offset}, +{len})", path.display()))?;
    Ok(Some(map))
}

/// A whole file mapped read-only.
pub struct MmapReadFile {
    fd: Descriptor,
    map: Option<Mmap>,
    len: u64,
    position: u64,
}

impl MmapReadFile {
    /// Map `path` in full.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &OpenOptions::read_default(), FileEventListener::default())
    }

    /// Map `path` with explicit open options and lifecycle hooks.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped.
    pub fn open_with(
        path: impl AsRef<Path>,
        options: &OpenOptions,
        listener: FileEventListener,
    ) -> Result<Self> {
        let fd = Descriptor::open(path.as_ref(), options, listener, "mmap file")?;
        let len = fd.size()?;
        let map = map_window(fd.file()?, fd.path(), 0, to_usize(len)?)?;
        Ok(Self {
            fd,
            map,
            len,
            position: 0,
        })
    }

    /// The mapped bytes. Empty once the file is closed.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Borrow `len` bytes at `offset` straight from the mapping.
    ///
    /// The slice is clamped to the end of the file.
    #[must_use]
    pub fn slice(&self, offset: u64, len: usize) -> &[u8] {
        let bytes = self.as_bytes();
        let start = to_usize(offset).unwrap_or(usize::MAX).min(bytes.len());
        let end = start.saturating_add(len).min(bytes.len());
        &bytes[start..end]
    }

    /// Bytes from the cursor to the end of the file.
    #[must_use]
    pub fn remaining(&self) -> &[u8] {
        self.slice(self.position, usize::MAX)
    }

    /// Move the cursor forward by `n` bytes, stopping at the end of the file.
    pub fn advance(&mut self, n: u64) {
        self.position = self.position.saturating_add(n).min(self.len);
    }
}

impl FileHandle for MmapReadFile {
    fn path(&self) -> &Path {
        self.fd.path()
    }

    fn size(&self) -> Result<u64> {
        if self.fd.is_open() {
            Ok(self.len)
        } else {
            Err(Error::NotOpen("mmap file"))
        }
    }

    fn close(&mut self) -> Result<()> {
        self.map = None;
        self.fd.close();
        Ok(())
    }
}

impl RandomRead for MmapReadFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if !self.fd.is_open() {
            return Err(Error::NotOpen("mmap file"));
        }
        let src = self.slice(offset, buf.len());
        buf[..src.len()].copy_from_slice(src);
        Ok(src.len())
    }
}

impl SequentialRead for MmapReadFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.read_at(self.position, buf)?;
        self.advance(n as u64);
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        self.advance(n);
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// A file from which read-only windows are mapped on request.
pub struct MmapSource {
    path: PathBuf,
    file: File,
    len: u64,
}

impl MmapSource {
    /// Open `path`; nothing is mapped until [`MmapSource::window`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or inspected.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        Ok(Self { path, file, len })
    }

    /// Length of the file when it was opened.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Map up to `len` bytes starting at `offset`, clamped to the file end.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping fails.
    pub fn window(&self, offset: u64, len: usize) -> Result<MmapWindow> {
        let available = to_usize(self.len.saturating_sub(offset))?;
        let len = len.min(available);
        let map = map_window(&self.file, &self.path, offset, len)?;
        Ok(MmapWindow { map })
    }
}

/// One mapped byte range; derefs to the mapped bytes.
pub struct MmapWindow {
    map: Option<Mmap>,
}

impl AsRef<[u8]> for MmapWindow {
    fn as_ref(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}

impl std::ops::Deref for MmapWindow {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

fn to_usize(n: u64) -> Result<usize> {
    usize::try_from(n)
        .map_err(|_| Error::InvalidArgument(format!("{n} bytes exceeds address space")))
}
