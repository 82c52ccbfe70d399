//! Compression codec bindings.
//!
//! A [`Codec`] wraps one external compression library behind a common
//! surface: one-shot compression into caller buffers, convenience `Vec`
//! variants and streaming adapters over [`std::io::Read`] / [`std::io::Write`].
//! Codecs are created by [`CompressionType`] through [`create_codec`]:
//!
//! ```
//! use strata::compress::{create_codec, CodecOptions, CompressionType};
//! # fn main() -> strata::Result<()> {
//! let ty = CompressionType::from_name("zstd")?;
//! if let Some(codec) = create_codec(ty, &CodecOptions::default())? {
//!     let packed = codec.compress_to_vec(b"aaaaaaaaaaaaaaaa")?;
//!     let unpacked = codec.decompress_to_vec(&packed, Some(16))?;
//!     assert_eq!(unpacked, b"aaaaaaaaaaaaaaaa");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Built-in Codecs
//!
//! Each backend sits behind a cargo feature, all enabled by default:
//! - **Gzip / zlib / raw deflate** via `flate2` (feature: `compression-gzip`)
//! - **Zstd** via `zstd` (feature: `compression-zstd`)
//! - **Bzip2** via `bzip2` (feature: `compression-bzip2`)
//! - **LZ4** raw block, frame and Hadoop framing via `lz4_flex` (feature: `compression-lz4`)
//! - **Snappy** raw format via `snap` (feature: `compression-snappy`)
//!
//! Brotli and LZO are recognized by name but have no backend; asking for them
//! yields [`Error::Unimplemented`].
//!
//! [`auto_detect_reader`] and [`auto_detect_writer`] pick a streaming codec
//! from a file extension or the leading magic bytes of a stream.

mod codecs;
mod detect;

use crate::error::{Error, Result};
use std::fmt;
use std::io::{Read, Write};

pub use detect::{auto_detect_reader, auto_detect_writer, detect_from_extension, detect_from_magic};

/// Supported and recognized compression formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompressionType {
    Uncompressed,
    Snappy,
    Gzip,
    Brotli,
    Zstd,
    /// Raw LZ4 block format.
    Lz4,
    /// LZ4 frame format.
    Lz4Frame,
    Lzo,
    Bz2,
    /// LZ4 blocks with the Hadoop length prefix.
    Lz4Hadoop,
}

impl CompressionType {
    pub const ALL: [Self; 10] = [
        Self::Uncompressed,
        Self::Snappy,
        Self::Gzip,
        Self::Brotli,
        Self::Zstd,
        Self::Lz4,
        Self::Lz4Frame,
        Self::Lzo,
        Self::Bz2,
        Self::Lz4Hadoop,
    ];

    /// Canonical lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uncompressed => "uncompressed",
            Self::Snappy => "snappy",
            Self::Gzip => "gzip",
            Self::Brotli => "brotli",
            Self::Zstd => "zstd",
            Self::Lz4 => "lz4_raw",
            Self::Lz4Frame => "lz4",
            Self::Lzo => "lzo",
            Self::Bz2 => "bz2",
            Self::Lz4Hadoop => "lz4_hadoop",
        }
    }

    /// Inverse of [`CompressionType::name`]. Matching is exact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an unrecognized name.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name() == name)
            .ok_or_else(|| Error::InvalidArgument(format!("Unrecognized compression type: {name}")))
    }

    /// Whether a backend for this format was compiled in.
    #[must_use]
    pub const fn is_available(self) -> bool {
        match self {
            Self::Uncompressed => true,
            Self::Gzip => cfg!(feature = "compression-gzip"),
            Self::Zstd => cfg!(feature = "compression-zstd"),
            Self::Bz2 => cfg!(feature = "compression-bzip2"),
            Self::Lz4 | Self::Lz4Frame | Self::Lz4Hadoop => cfg!(feature = "compression-lz4"),
            Self::Snappy => cfg!(feature = "compression-snappy"),
            Self::Brotli | Self::Lzo => false,
        }
    }

    /// Whether the format accepts a compression level.
    #[must_use]
    pub const fn supports_compression_level(self) -> bool {
        matches!(
            self,
            Self::Gzip | Self::Brotli | Self::Zstd | Self::Bz2 | Self::Lz4Frame | Self::Lz4
        )
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CompressionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Container format produced by the gzip codec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GzipFormat {
    Zlib,
    Deflate,
    #[default]
    Gzip,
}

/// Settings passed to [`create_codec`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodecOptions {
    /// `None` selects the codec's default level.
    pub compression_level: Option<i32>,
    pub gzip_format: GzipFormat,
    /// Gzip window size exponent, 9 through 15.
    pub window_bits: Option<u8>,
}

impl CodecOptions {
    #[must_use]
    pub fn with_level(level: i32) -> Self {
        Self {
            compression_level: Some(level),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn gzip_format(mut self, format: GzipFormat) -> Self {
        self.gzip_format = format;
        self
    }

    #[must_use]
    pub fn window_bits(mut self, bits: u8) -> Self {
        self.window_bits = Some(bits);
        self
    }
}

/// A compression backend.
///
/// Implementations are cheap to create and hold no per-call state, so one
/// codec can serve many threads.
pub trait Codec: Send + Sync {
    fn compression_type(&self) -> CompressionType;

    /// Name of the format, as accepted by [`CompressionType::from_name`].
    fn name(&self) -> &'static str {
        self.compression_type().name()
    }

    /// Level this codec compresses at, `None` for codecs without levels.
    fn compression_level(&self) -> Option<i32>;

    fn minimum_compression_level(&self) -> Option<i32>;

    fn maximum_compression_level(&self) -> Option<i32>;

    fn default_compression_level(&self) -> Option<i32>;

    /// Upper bound on the compressed size of `input_len` bytes.
    fn max_compressed_len(&self, input_len: usize) -> usize;

    /// Compress `input` into `output`, returning the compressed size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if `output` is too small or the backend fails.
    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;

    /// Decompress `input` into `output`, returning the decompressed size.
    /// `output` must be large enough for the whole result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] for corrupt input or a short `output`.
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;

    /// Compress into a new vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if the backend fails.
    fn compress_to_vec(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0; self.max_compressed_len(input.len())];
        let n = self.compress(input, &mut out)?;
        out.truncate(n);
        Ok(out)
    }

    /// Decompress into a new vector. Formats that do not record their own
    /// length need `expected_len`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] for corrupt input and
    /// [`Error::InvalidArgument`] when a required length is missing.
    fn decompress_to_vec(&self, input: &[u8], expected_len: Option<usize>) -> Result<Vec<u8>>;

    /// Wrap `writer` so bytes written are compressed. The stream is finished
    /// when the returned writer is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unimplemented`] for formats without a streaming form.
    fn compress_writer<'a>(&self, writer: Box<dyn Write + 'a>) -> Result<Box<dyn Write + 'a>> {
        drop(writer);
        Err(Error::Unimplemented(format!("streaming compression for {}", self.name())))
    }

    /// Wrap `reader` so bytes read are decompressed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unimplemented`] for formats without a streaming form.
    fn decompress_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>> {
        drop(reader);
        Err(Error::Unimplemented(format!("streaming decompression for {}", self.name())))
    }
}

impl fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("type", &self.compression_type())
            .field("level", &self.compression_level())
            .finish()
    }
}

/// Build a codec. `Uncompressed` yields `Ok(None)`.
///
/// # Errors
///
/// - [`Error::Unimplemented`] when the backend is not compiled in (always for
///   Brotli and LZO).
/// - [`Error::InvalidArgument`] when a level is given to a codec without
///   levels, or lies outside the codec's range, or gzip options are invalid.
pub fn create_codec(ty: CompressionType, options: &CodecOptions) -> Result<Option<Box<dyn Codec>>> {
    if !ty.is_available() {
        return Err(match ty {
            CompressionType::Lzo => Error::Unimplemented("LZO codec not implemented".into()),
            _ => Error::Unimplemented(format!("Support for codec '{ty}' not built")),
        });
    }
    if options.compression_level.is_some() && !ty.supports_compression_level() {
        return Err(Error::InvalidArgument(format!(
            "Codec '{ty}' doesn't support setting a compression level."
        )));
    }
    if ty == CompressionType::Uncompressed {
        return Ok(None);
    }
    codecs::build(ty, options).map(Some)
}

/// Convenience for [`create_codec`] with only a level.
///
/// # Errors
///
/// See [`create_codec`].
pub fn create_codec_with_level(ty: CompressionType, level: i32) -> Result<Option<Box<dyn Codec>>> {
    create_codec(ty, &CodecOptions::with_level(level))
}

fn level_query(ty: CompressionType, pick: fn(&dyn Codec) -> Option<i32>) -> Result<i32> {
    if !ty.supports_compression_level() {
        return Err(Error::InvalidArgument(format!(
            "The specified codec '{ty}' does not support the compression level parameter"
        )));
    }
    let codec = create_codec(ty, &CodecOptions::default())?
        .ok_or_else(|| Error::InvalidArgument(format!("no codec for {ty}")))?;
    pick(codec.as_ref()).ok_or_else(|| Error::InvalidArgument(format!("{ty} has no levels")))
}

/// # Errors
///
/// Returns an error if `ty` has no levels or is not built.
pub fn minimum_compression_level(ty: CompressionType) -> Result<i32> {
    level_query(ty, |c| c.minimum_compression_level())
}

/// # Errors
///
/// Returns an error if `ty` has no levels or is not built.
pub fn maximum_compression_level(ty: CompressionType) -> Result<i32> {
    level_query(ty, |c| c.maximum_compression_level())
}

/// # Errors
///
/// Returns an error if `ty` has no levels or is not built.
pub fn default_compression_level(ty: CompressionType) -> Result<i32> {
    level_query(ty, |c| c.default_compression_level())
}
