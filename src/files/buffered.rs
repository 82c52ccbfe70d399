//! Cached readers and writers with typed binary helpers.
//!
//! Both sides keep a `bytes` buffer in front of a [`SequentialRead`] or
//! [`SequentialWrite`] file and expose fixed-width integer and float
//! accessors in either byte order:
//!
//! ```no_run
//! use strata::files::{
//!     BufferedReader, BufferedWriter, Endian, SequentialReadFile, SequentialWriteFile,
//! };
//! # fn main() -> strata::Result<()> {
//! let mut out = BufferedWriter::new(SequentialWriteFile::truncate_open("ids.bin")?);
//! out.write_u32(7, Endian::Little)?;
//! out.write_f64(0.5, Endian::Big)?;
//! out.finalize()?;
//!
//! let mut input = BufferedReader::new(SequentialReadFile::open("ids.bin")?);
//! assert_eq!(input.read_u32(Endian::Little)?, 7);
//! assert_eq!(input.read_f64(Endian::Big)?, 0.5);
//! # Ok(())
//! # }
//! ```

use super::traits::{SequentialRead, SequentialWrite};
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::mem::size_of;
use tracing::warn;

/// Default and minimum cache size for buffered I/O.
pub const DEFAULT_CACHE_SIZE: usize = 1 << 20;

/// Byte order of a typed value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

macro_rules! typed_reads {
    ($($name:ident -> $ty:ty: $le:ident, $be:ident;)*) => {
        $(
            #[doc = concat!("Read one `", stringify!($ty), "` in the given byte order.")]
            ///
            /// # Errors
            ///
            /// Returns [`Error::DataLoss`] if the file ends first.
            pub fn $name(&mut self, endian: Endian) -> Result<$ty> {
                self.require(size_of::<$ty>(), stringify!($ty))?;
                Ok(match endian {
                    Endian::Little => self.cache.$le(),
                    Endian::Big => self.cache.$be(),
                })
            }
        )*
    };
}

macro_rules! typed_writes {
    ($($name:ident($ty:ty): $le:ident, $be:ident;)*) => {
        $(
            #[doc = concat!("Append one `", stringify!($ty), "` in the given byte order.")]
            ///
            /// # Errors
            ///
            /// Returns an error if the writer is finalized or a flush fails.
            pub fn $name(&mut self, value: $ty, endian: Endian) -> Result<()> {
                self.check_open()?;
                match endian {
                    Endian::Little => self.cache.$le(value),
                    Endian::Big => self.cache.$be(value),
                }
                self.after_append()
            }
        )*
    };
}

/// Reads through an in-memory cache.
pub struct BufferedReader<R: SequentialRead> {
    inner: R,
    cache: BytesMut,
    cache_size: usize,
    eof: bool,
}

impl<R: SequentialRead> BufferedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: BytesMut::new(),
            cache_size: DEFAULT_CACHE_SIZE,
            eof: false,
        }
    }

    /// Change how much is read from the file at once. Values below
    /// [`DEFAULT_CACHE_SIZE`] are raised to it.
    pub fn set_cache_size(&mut self, size: usize) {
        self.cache_size = size.max(DEFAULT_CACHE_SIZE);
    }

    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Top the cache up until it holds `want` bytes or the file ends.
    fn fill(&mut self, want: usize) -> Result<()> {
        while self.cache.len() < want && !self.eof {
            let start = self.cache.len();
            let chunk = self.cache_size.max(want - start);
            self.cache.resize(start + chunk, 0);
            match self.inner.read(&mut self.cache[start..]) {
                Ok(n) => {
                    self.cache.truncate(start + n);
                    self.eof = n == 0;
                }
                Err(e) => {
                    self.cache.truncate(start);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn require(&mut self, n: usize, what: &str) -> Result<()> {
        self.fill(n)?;
        if self.cache.len() < n {
            return Err(Error::DataLoss(format!(
                "reading {what} from {} needs {n} bytes, {} left",
                self.inner.path().display(),
                self.cache.len()
            )));
        }
        Ok(())
    }

    /// Read up to `n` bytes; fewer are returned only at end of file.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    pub fn read(&mut self, n: usize) -> Result<Bytes> {
        self.fill(n)?;
        let take = n.min(self.cache.len());
        Ok(self.cache.split_to(take).freeze())
    }

    /// Append up to `n` bytes to `out`, returning how many were appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    pub fn read_into(&mut self, out: &mut Vec<u8>, n: usize) -> Result<usize> {
        let bytes = self.read(n)?;
        out.extend_from_slice(&bytes);
        Ok(bytes.len())
    }

    /// Read exactly `buf.len()` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataLoss`] if the file ends first.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.require(buf.len(), "byte range")?;
        self.cache.copy_to_slice(buf);
        Ok(())
    }

    /// Whether every byte of the file has been consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if probing the file fails.
    pub fn reach_end(&mut self) -> Result<bool> {
        self.fill(1)?;
        Ok(self.cache.is_empty())
    }

    /// # Errors
    ///
    /// Returns [`Error::DataLoss`] at end of file.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1, "u8")?;
        Ok(self.cache.get_u8())
    }

    /// # Errors
    ///
    /// Returns [`Error::DataLoss`] at end of file.
    pub fn read_i8(&mut self) -> Result<i8> {
        self.require(1, "i8")?;
        Ok(self.cache.get_i8())
    }

    /// A single byte, nonzero meaning `true`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataLoss`] at end of file.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    typed_reads! {
        read_u16 -> u16: get_u16_le, get_u16;
        read_i16 -> i16: get_i16_le, get_i16;
        read_u32 -> u32: get_u32_le, get_u32;
        read_i32 -> i32: get_i32_le, get_i32;
        read_u64 -> u64: get_u64_le, get_u64;
        read_i64 -> i64: get_i64_le, get_i64;
        read_f32 -> f32: get_f32_le, get_f32;
        read_f64 -> f64: get_f64_le, get_f64;
    }
}

/// Writes through an in-memory cache that is flushed once it is full.
///
/// Call [`BufferedWriter::finalize`] when done; a writer dropped without it
/// logs a warning and makes a best-effort flush.
pub struct BufferedWriter<W: SequentialWrite> {
    inner: W,
    cache: BytesMut,
    cache_size: usize,
    written: u64,
    finalized: bool,
}

impl<W: SequentialWrite> BufferedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_cache_size(inner, DEFAULT_CACHE_SIZE)
    }

    /// A writer whose cache holds `cache_size` bytes (at least one).
    pub fn with_cache_size(inner: W, cache_size: usize) -> Self {
        let cache_size = cache_size.max(1);
        Self {
            inner,
            cache: BytesMut::with_capacity(cache_size),
            cache_size,
            written: 0,
            finalized: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Bytes accepted so far, cached or not.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.written + self.cache.len() as u64
    }

    fn check_open(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::InvalidArgument(format!(
                "write to finalized buffered writer for {}",
                self.inner.path().display()
            )));
        }
        Ok(())
    }

    fn after_append(&mut self) -> Result<()> {
        if self.cache.len() >= self.cache_size {
            self.flush_cache()?;
        }
        Ok(())
    }

    fn flush_cache(&mut self) -> Result<()> {
        if self.cache.is_empty() {
            return Ok(());
        }
        self.inner.write(&self.cache)?;
        self.written += self.cache.len() as u64;
        self.cache.clear();
        Ok(())
    }

    /// Append raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is finalized or a flush fails.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.check_open()?;
        self.cache.put_slice(data);
        self.after_append()
    }

    /// # Errors
    ///
    /// Returns an error if the writer is finalized or a flush fails.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.check_open()?;
        self.cache.put_u8(value);
        self.after_append()
    }

    /// # Errors
    ///
    /// Returns an error if the writer is finalized or a flush fails.
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.check_open()?;
        self.cache.put_i8(value);
        self.after_append()
    }

    /// # Errors
    ///
    /// Returns an error if the writer is finalized or a flush fails.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    typed_writes! {
        write_u16(u16): put_u16_le, put_u16;
        write_i16(i16): put_i16_le, put_i16;
        write_u32(u32): put_u32_le, put_u32;
        write_i32(i32): put_i32_le, put_i32;
        write_u64(u64): put_u64_le, put_u64;
        write_i64(i64): put_i64_le, put_i64;
        write_f32(f32): put_f32_le, put_f32;
        write_f64(f64): put_f64_le, put_f64;
    }

    /// Write out the cache and sync the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or sync fails.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_cache()?;
        self.inner.flush()
    }

    /// Flush everything and refuse further writes. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn finalize(&mut self) -> Result<()> {
        if !self.finalized {
            self.flush()?;
            self.finalized = true;
        }
        Ok(())
    }
}

impl<W: SequentialWrite> Drop for BufferedWriter<W> {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        warn!(
            path = %self.inner.path().display(),
            pending = self.cache.len(),
            "buffered writer dropped without finalize"
        );
        if let Err(e) = self.flush() {
            warn!(error = %e, "flush on drop failed");
        }
    }
}
