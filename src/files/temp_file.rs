//! Self-deleting scratch files with predictable name shapes.

use super::traits::{FileHandle, SequentialWrite};
use crate::error::{Error, IoContext, Result};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

pub const DEFAULT_PREFIX: &str = "temp_file_";
pub const DEFAULT_RANDOM_CHARS: usize = 6;

fn builder<'a>(prefix: &'a str, suffix: &'a str, random_chars: usize) -> Builder<'a, 'a> {
    let mut builder = Builder::new();
    builder.prefix(prefix).suffix(suffix).rand_bytes(random_chars);
    builder
}

fn suffix_for(extension: Option<&str>) -> String {
    extension.map(|ext| format!(".{ext}")).unwrap_or_default()
}

/// Produce a fresh file name `<prefix><random_chars alphanumerics>[.<ext>]`
/// without creating anything on disk.
///
/// # Errors
///
/// Returns an error if no name could be generated.
pub fn temp_file_name(
    prefix: &str,
    extension: Option<&str>,
    random_chars: usize,
) -> Result<String> {
    let suffix = suffix_for(extension);
    let named = builder(prefix, &suffix, random_chars)
        .make(|path| Ok(path.to_path_buf()))
        .with_context(|| "generate temp file name")?;
    let (path, _) = named
        .keep()
        .map_err(|e| Error::io("generate temp file name", e.error))?;
    Ok(path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default())
}

/// A write handle on a freshly created file that is removed on drop.
///
/// ```no_run
/// use strata::files::{SequentialWrite, TempFile};
/// # fn main() -> strata::Result<()> {
/// let mut scratch = TempFile::create("spill_", Some("bin"), 8)?;
/// scratch.write(b"partial results")?;
/// # Ok(())
/// # }
/// ```
pub struct TempFile {
    inner: Option<NamedTempFile>,
    path: PathBuf,
}

impl TempFile {
    /// Create a temp file in the system temp directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(prefix: &str, extension: Option<&str>, random_chars: usize) -> Result<Self> {
        Self::create_in(std::env::temp_dir(), prefix, extension, random_chars)
    }

    /// Create a temp file inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create_in(
        dir: impl AsRef<Path>,
        prefix: &str,
        extension: Option<&str>,
        random_chars: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let suffix = suffix_for(extension);
        let inner = builder(prefix, &suffix, random_chars)
            .tempfile_in(dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;
        let path = inner.path().to_path_buf();
        Ok(Self {
            inner: Some(inner),
            path,
        })
    }

    /// Create a temp file with the default prefix and name length.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn with_defaults() -> Result<Self> {
        Self::create(DEFAULT_PREFIX, None, DEFAULT_RANDOM_CHARS)
    }

    /// Stop tracking the file so it survives this handle, returning its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file was already closed.
    pub fn keep(mut self) -> Result<PathBuf> {
        let inner = self.inner.take().ok_or(Error::NotOpen("temp file"))?;
        let (_, path) = inner
            .keep()
            .map_err(|e| Error::io(format!("keep {}", self.path.display()), e.error))?;
        Ok(path)
    }

    fn named(&mut self) -> Result<&mut NamedTempFile> {
        self.inner.as_mut().ok_or(Error::NotOpen("temp file"))
    }
}

impl FileHandle for TempFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> Result<u64> {
        let inner = self.inner.as_ref().ok_or(Error::NotOpen("temp file"))?;
        Ok(inner
            .as_file()
            .metadata()
            .with_context(|| format!("stat {}", self.path.display()))?
            .len())
    }

    /// Closing deletes the file.
    fn close(&mut self) -> Result<()> {
        if let Some(inner) = self.inner.take() {
            inner
                .close()
                .with_context(|| format!("remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

impl SequentialWrite for TempFile {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let path = self.path.clone();
        self.named()?
            .write_all(data)
            .with_context(|| format!("write {}", path.display()))
    }

    fn flush(&mut self) -> Result<()> {
        let path = self.path.clone();
        let named = self.named()?;
        named
            .flush()
            .and_then(|()| named.as_file().sync_data())
            .with_context(|| format!("sync {}", path.display()))
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        let path = self.path.clone();
        let named = self.named()?;
        named
            .as_file()
            .set_len(size)
            .and_then(|()| named.seek(SeekFrom::End(0)).map(drop))
            .with_context(|| format!("truncate {}", path.display()))
    }
}
