//! Capability traits implemented by the concrete file types.
//!
//! Each trait describes one access pattern. Code that only needs to stream
//! bytes in takes `impl SequentialRead`; code that needs positioned reads
//! takes `impl RandomRead`, and so on. All of them share [`FileHandle`] for
//! the path, size and close operations.

use crate::error::Result;
use std::path::Path;

/// Operations common to every open file.
pub trait FileHandle {
    /// Path the file was opened with.
    fn path(&self) -> &Path;

    /// Current size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or its metadata is unavailable.
    fn size(&self) -> Result<u64>;

    /// Release the underlying descriptor. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if pending data could not be synced.
    fn close(&mut self) -> Result<()>;
}

/// Forward-only reads with a cursor.
pub trait SequentialRead: FileHandle {
    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the read fails.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Append up to `limit` bytes (or everything left, for `None`) to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the read fails.
    fn read_to_vec(&mut self, out: &mut Vec<u8>, limit: Option<usize>) -> Result<usize> {
        let mut total = 0;
        let mut chunk = [0u8; 64 * 1024];
        loop {
            let want = match limit {
                Some(limit) if total >= limit => break,
                Some(limit) => chunk.len().min(limit - total),
                None => chunk.len(),
            };
            let n = self.read(&mut chunk[..want])?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
            total += n;
        }
        Ok(total)
    }

    /// Advance the cursor by `n` bytes without reading them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the seek fails.
    fn skip(&mut self, n: u64) -> Result<()>;

    /// Current cursor offset from the start of the file.
    fn position(&self) -> u64;

    /// Whether the cursor has reached the end of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file size cannot be queried.
    fn is_eof(&self) -> Result<bool> {
        Ok(self.position() >= self.size()?)
    }
}

/// Positioned reads that leave no cursor behind.
pub trait RandomRead: FileHandle {
    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the read fails.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Append up to `limit` bytes starting at `offset` to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the read fails.
    fn read_at_to_vec(
        &self,
        offset: u64,
        out: &mut Vec<u8>,
        limit: Option<usize>,
    ) -> Result<usize> {
        let size = self.size()?;
        let available = usize::try_from(size.saturating_sub(offset)).unwrap_or(usize::MAX);
        let want = limit.map_or(available, |l| l.min(available));
        let start = out.len();
        out.resize(start + want, 0);
        let mut filled = 0;
        while filled < want {
            let n = self.read_at(offset + filled as u64, &mut out[start + filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        out.truncate(start + filled);
        Ok(filled)
    }
}

/// Appending writes.
pub trait SequentialWrite: FileHandle {
    /// Write all of `data` at the end of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the write fails.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Push written data down to the storage device.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the sync fails.
    fn flush(&mut self) -> Result<()>;

    /// Cut or extend the file to `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the resize fails.
    fn truncate(&mut self, size: u64) -> Result<()>;
}

/// Positioned writes.
pub trait RandomWrite: FileHandle {
    /// Write all of `data` at `offset`. With `truncate`, the file ends right
    /// after the written range.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the write fails.
    fn write_at(&mut self, offset: u64, data: &[u8], truncate: bool) -> Result<()>;

    /// Push written data down to the storage device.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the sync fails.
    fn flush(&mut self) -> Result<()>;

    /// Cut or extend the file to `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the resize fails.
    fn truncate(&mut self, size: u64) -> Result<()>;
}
