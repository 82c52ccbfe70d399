//! Backend implementations of [`Codec`].

use super::{Codec, CodecOptions, CompressionType};
#[cfg(feature = "compression-gzip")]
use super::GzipFormat;
use crate::error::{Error, Result};
#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-lz4",
    feature = "compression-snappy"
))]
use std::io::{Read, Write};

#[cfg_attr(
    not(any(
        feature = "compression-gzip",
        feature = "compression-zstd",
        feature = "compression-bzip2",
        feature = "compression-lz4"
    )),
    allow(unused_variables)
)]
pub(super) fn build(ty: CompressionType, options: &CodecOptions) -> Result<Box<dyn Codec>> {
    match ty {
        #[cfg(feature = "compression-gzip")]
        CompressionType::Gzip => Ok(Box::new(GzipCodec::new(options)?)),
        #[cfg(feature = "compression-zstd")]
        CompressionType::Zstd => Ok(Box::new(ZstdCodec::new(options.compression_level)?)),
        #[cfg(feature = "compression-bzip2")]
        CompressionType::Bz2 => Ok(Box::new(Bz2Codec::new(options.compression_level)?)),
        #[cfg(feature = "compression-lz4")]
        CompressionType::Lz4 | CompressionType::Lz4Frame | CompressionType::Lz4Hadoop => {
            Ok(Box::new(Lz4Codec::new(ty, options.compression_level)?))
        }
        #[cfg(feature = "compression-snappy")]
        CompressionType::Snappy => Ok(Box::new(SnappyCodec)),
        other => Err(Error::Unimplemented(format!("Support for codec '{other}' not built"))),
    }
}

#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-lz4"
))]
fn resolve_level(
    ty: CompressionType,
    requested: Option<i32>,
    min: i32,
    max: i32,
    default: i32,
) -> Result<i32> {
    match requested {
        None => Ok(default),
        Some(level) if (min..=max).contains(&level) => Ok(level),
        Some(level) => Err(Error::InvalidArgument(format!(
            "{ty} compression level {level} is outside {min}..={max}"
        ))),
    }
}

/// Copy a buffer produced by a backend into the caller's output.
#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-bzip2",
    feature = "compression-lz4"
))]
fn copy_out(codec: &'static str, produced: &[u8], output: &mut [u8]) -> Result<usize> {
    if produced.len() > output.len() {
        return Err(Error::codec(
            codec,
            format!("output buffer too small: need {}, have {}", produced.len(), output.len()),
        ));
    }
    output[..produced.len()].copy_from_slice(produced);
    Ok(produced.len())
}

/// Drain a decoding reader into `output`; leftover data means `output` was short.
#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-bzip2",
    feature = "compression-lz4"
))]
fn read_into(codec: &'static str, mut reader: impl Read, output: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < output.len() {
        let n = reader.read(&mut output[filled..]).map_err(|e| Error::codec(codec, e))?;
        if n == 0 {
            return Ok(filled);
        }
        filled += n;
    }
    let mut probe = [0u8; 1];
    match reader.read(&mut probe) {
        Ok(0) => Ok(filled),
        Ok(_) => Err(Error::codec(codec, "output buffer too small")),
        Err(e) => Err(Error::codec(codec, e)),
    }
}

#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-bzip2",
    feature = "compression-lz4"
))]
fn read_to_vec(
    codec: &'static str,
    mut reader: impl Read,
    expected_len: Option<usize>,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len.unwrap_or(0));
    reader.read_to_end(&mut out).map_err(|e| Error::codec(codec, e))?;
    Ok(out)
}

// ============================================================================
// Gzip / zlib / deflate
// ============================================================================

#[cfg(feature = "compression-gzip")]
struct GzipCodec {
    level: i32,
    format: GzipFormat,
}

#[cfg(feature = "compression-gzip")]
impl GzipCodec {
    const MIN_LEVEL: i32 = 1;
    const MAX_LEVEL: i32 = 9;
    const DEFAULT_LEVEL: i32 = 9;
    const MIN_WINDOW_BITS: u8 = 9;
    const MAX_WINDOW_BITS: u8 = 15;

    fn new(options: &CodecOptions) -> Result<Self> {
        if let Some(bits) = options.window_bits {
            if !(Self::MIN_WINDOW_BITS..=Self::MAX_WINDOW_BITS).contains(&bits) {
                return Err(Error::InvalidArgument(format!(
                    "GZip window_bits should be between {} and {}",
                    Self::MIN_WINDOW_BITS,
                    Self::MAX_WINDOW_BITS
                )));
            }
            // flate2's pure-Rust backend always uses a 32 KiB window.
            if bits != Self::MAX_WINDOW_BITS {
                return Err(Error::Unimplemented(format!("gzip window_bits {bits}")));
            }
        }
        let level = resolve_level(
            CompressionType::Gzip,
            options.compression_level,
            Self::MIN_LEVEL,
            Self::MAX_LEVEL,
            Self::DEFAULT_LEVEL,
        )?;
        Ok(Self {
            level,
            format: options.gzip_format,
        })
    }

    fn compression(&self) -> flate2::Compression {
        flate2::Compression::new(self.level.unsigned_abs())
    }

    fn encode(&self, input: &[u8]) -> std::io::Result<Vec<u8>> {
        use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
        let out = Vec::with_capacity(self.max_compressed_len(input.len()));
        match self.format {
            GzipFormat::Gzip => {
                let mut enc = GzEncoder::new(out, self.compression());
                enc.write_all(input)?;
                enc.finish()
            }
            GzipFormat::Zlib => {
                let mut enc = ZlibEncoder::new(out, self.compression());
                enc.write_all(input)?;
                enc.finish()
            }
            GzipFormat::Deflate => {
                let mut enc = DeflateEncoder::new(out, self.compression());
                enc.write_all(input)?;
                enc.finish()
            }
        }
    }

    /// Decoder for a complete in-memory input. Gzip and zlib framings are
    /// told apart by the gzip magic so either decodes under both settings.
    fn slice_decoder<'a>(&self, input: &'a [u8]) -> Box<dyn Read + 'a> {
        use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
        match self.format {
            GzipFormat::Deflate => Box::new(DeflateDecoder::new(input)),
            GzipFormat::Gzip | GzipFormat::Zlib if input.starts_with(&[0x1f, 0x8b]) => {
                Box::new(MultiGzDecoder::new(input))
            }
            GzipFormat::Gzip | GzipFormat::Zlib => Box::new(ZlibDecoder::new(input)),
        }
    }
}

#[cfg(feature = "compression-gzip")]
impl Codec for GzipCodec {
    fn compression_type(&self) -> CompressionType {
        CompressionType::Gzip
    }

    fn compression_level(&self) -> Option<i32> {
        Some(self.level)
    }

    fn minimum_compression_level(&self) -> Option<i32> {
        Some(Self::MIN_LEVEL)
    }

    fn maximum_compression_level(&self) -> Option<i32> {
        Some(Self::MAX_LEVEL)
    }

    fn default_compression_level(&self) -> Option<i32> {
        Some(Self::DEFAULT_LEVEL)
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        input_len + (input_len >> 12) + (input_len >> 14) + (input_len >> 25) + 64
    }

    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let produced = self.encode(input).map_err(|e| Error::codec("gzip", e))?;
        copy_out("gzip", &produced, output)
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        read_into("gzip", self.slice_decoder(input), output)
    }

    fn decompress_to_vec(&self, input: &[u8], expected_len: Option<usize>) -> Result<Vec<u8>> {
        read_to_vec("gzip", self.slice_decoder(input), expected_len)
    }

    fn compress_writer<'a>(&self, writer: Box<dyn Write + 'a>) -> Result<Box<dyn Write + 'a>> {
        use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
        Ok(match self.format {
            GzipFormat::Gzip => Box::new(GzEncoder::new(writer, self.compression())),
            GzipFormat::Zlib => Box::new(ZlibEncoder::new(writer, self.compression())),
            GzipFormat::Deflate => Box::new(DeflateEncoder::new(writer, self.compression())),
        })
    }

    fn decompress_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>> {
        use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
        Ok(match self.format {
            GzipFormat::Gzip => Box::new(MultiGzDecoder::new(reader)),
            GzipFormat::Zlib => Box::new(ZlibDecoder::new(reader)),
            GzipFormat::Deflate => Box::new(DeflateDecoder::new(reader)),
        })
    }
}

// ============================================================================
// Zstd
// ============================================================================

#[cfg(feature = "compression-zstd")]
struct ZstdCodec {
    level: i32,
}

#[cfg(feature = "compression-zstd")]
impl ZstdCodec {
    const DEFAULT_LEVEL: i32 = 1;

    fn new(level: Option<i32>) -> Result<Self> {
        let range = zstd::compression_level_range();
        let level = resolve_level(
            CompressionType::Zstd,
            level,
            *range.start(),
            *range.end(),
            Self::DEFAULT_LEVEL,
        )?;
        Ok(Self { level })
    }
}

#[cfg(feature = "compression-zstd")]
impl Codec for ZstdCodec {
    fn compression_type(&self) -> CompressionType {
        CompressionType::Zstd
    }

    fn compression_level(&self) -> Option<i32> {
        Some(self.level)
    }

    fn minimum_compression_level(&self) -> Option<i32> {
        Some(*zstd::compression_level_range().start())
    }

    fn maximum_compression_level(&self) -> Option<i32> {
        Some(*zstd::compression_level_range().end())
    }

    fn default_compression_level(&self) -> Option<i32> {
        Some(Self::DEFAULT_LEVEL)
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        zstd::zstd_safe::compress_bound(input_len)
    }

    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        zstd::bulk::compress_to_buffer(input, output, self.level)
            .map_err(|e| Error::codec("zstd", e))
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        zstd::bulk::decompress_to_buffer(input, output).map_err(|e| Error::codec("zstd", e))
    }

    fn decompress_to_vec(&self, input: &[u8], expected_len: Option<usize>) -> Result<Vec<u8>> {
        match expected_len {
            Some(len) => zstd::bulk::decompress(input, len),
            None => zstd::stream::decode_all(input),
        }
        .map_err(|e| Error::codec("zstd", e))
    }

    fn compress_writer<'a>(&self, writer: Box<dyn Write + 'a>) -> Result<Box<dyn Write + 'a>> {
        let encoder = zstd::stream::write::Encoder::new(writer, self.level)
            .map_err(|e| Error::codec("zstd", e))?;
        Ok(Box::new(encoder.auto_finish()))
    }

    fn decompress_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>> {
        let decoder =
            zstd::stream::read::Decoder::new(reader).map_err(|e| Error::codec("zstd", e))?;
        Ok(Box::new(decoder))
    }
}

// ============================================================================
// Bzip2
// ============================================================================

#[cfg(feature = "compression-bzip2")]
struct Bz2Codec {
    level: i32,
}

#[cfg(feature = "compression-bzip2")]
impl Bz2Codec {
    const MIN_LEVEL: i32 = 1;
    const MAX_LEVEL: i32 = 9;
    const DEFAULT_LEVEL: i32 = 9;

    fn new(level: Option<i32>) -> Result<Self> {
        let level = resolve_level(
            CompressionType::Bz2,
            level,
            Self::MIN_LEVEL,
            Self::MAX_LEVEL,
            Self::DEFAULT_LEVEL,
        )?;
        Ok(Self { level })
    }

    fn compression(&self) -> bzip2::Compression {
        bzip2::Compression::new(self.level.unsigned_abs())
    }
}

#[cfg(feature = "compression-bzip2")]
impl Codec for Bz2Codec {
    fn compression_type(&self) -> CompressionType {
        CompressionType::Bz2
    }

    fn compression_level(&self) -> Option<i32> {
        Some(self.level)
    }

    fn minimum_compression_level(&self) -> Option<i32> {
        Some(Self::MIN_LEVEL)
    }

    fn maximum_compression_level(&self) -> Option<i32> {
        Some(Self::MAX_LEVEL)
    }

    fn default_compression_level(&self) -> Option<i32> {
        Some(Self::DEFAULT_LEVEL)
    }

    /// bzip2 documents output as at most 1% larger than the input plus 600 bytes.
    fn max_compressed_len(&self, input_len: usize) -> usize {
        input_len + input_len / 100 + 600
    }

    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let mut enc = bzip2::write::BzEncoder::new(Vec::new(), self.compression());
        let produced = enc
            .write_all(input)
            .and_then(|()| enc.finish())
            .map_err(|e| Error::codec("bz2", e))?;
        copy_out("bz2", &produced, output)
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        read_into("bz2", bzip2::read::MultiBzDecoder::new(input), output)
    }

    fn decompress_to_vec(&self, input: &[u8], expected_len: Option<usize>) -> Result<Vec<u8>> {
        read_to_vec("bz2", bzip2::read::MultiBzDecoder::new(input), expected_len)
    }

    fn compress_writer<'a>(&self, writer: Box<dyn Write + 'a>) -> Result<Box<dyn Write + 'a>> {
        Ok(Box::new(bzip2::write::BzEncoder::new(writer, self.compression())))
    }

    fn decompress_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>> {
        Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader)))
    }
}

// ============================================================================
// LZ4 (raw block, frame, Hadoop)
// ============================================================================

#[cfg(feature = "compression-lz4")]
struct Lz4Codec {
    ty: CompressionType,
    level: Option<i32>,
}

#[cfg(feature = "compression-lz4")]
impl Lz4Codec {
    const MIN_LEVEL: i32 = 1;
    const MAX_LEVEL: i32 = 12;
    const DEFAULT_LEVEL: i32 = 1;
    const HADOOP_PREFIX: usize = 8;
    const FRAME_BLOCK: usize = 64 * 1024;

    /// lz4_flex has a single speed setting; levels are validated and recorded.
    fn new(ty: CompressionType, level: Option<i32>) -> Result<Self> {
        let level = if ty == CompressionType::Lz4Hadoop {
            None
        } else {
            Some(resolve_level(ty, level, Self::MIN_LEVEL, Self::MAX_LEVEL, Self::DEFAULT_LEVEL)?)
        };
        Ok(Self { ty, level })
    }

    fn levels(&self) -> bool {
        self.ty != CompressionType::Lz4Hadoop
    }

    fn block_bound(input_len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(input_len)
    }

    fn err(&self, e: impl ToString) -> Error {
        Error::codec(self.ty.name(), e)
    }

    fn compress_hadoop(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if output.len() < Self::HADOOP_PREFIX {
            return Err(self.err("output buffer too small for the Hadoop prefix"));
        }
        let (prefix, body) = output.split_at_mut(Self::HADOOP_PREFIX);
        let n = lz4_flex::block::compress_into(input, body).map_err(|e| self.err(e))?;
        let raw_len = u32::try_from(input.len()).map_err(|_| self.err("input exceeds 4 GiB"))?;
        let packed_len = u32::try_from(n).map_err(|_| self.err("block exceeds 4 GiB"))?;
        prefix[..4].copy_from_slice(&raw_len.to_be_bytes());
        prefix[4..].copy_from_slice(&packed_len.to_be_bytes());
        Ok(Self::HADOOP_PREFIX + n)
    }

    /// Decode a run of `[raw len][packed len][block]` frames. `None` means the
    /// input is not Hadoop-framed.
    fn decompress_hadoop(input: &[u8], output: &mut [u8]) -> Option<usize> {
        let mut input = input;
        let mut written = 0;
        while input.len() >= Self::HADOOP_PREFIX {
            let raw_len = u32::from_be_bytes(<[u8; 4]>::try_from(&input[..4]).ok()?) as usize;
            let packed_len = u32::from_be_bytes(<[u8; 4]>::try_from(&input[4..8]).ok()?) as usize;
            input = &input[Self::HADOOP_PREFIX..];
            if packed_len > input.len() || raw_len > output.len() - written {
                return None;
            }
            let n = lz4_flex::block::decompress_into(
                &input[..packed_len],
                &mut output[written..written + raw_len],
            )
            .ok()?;
            if n != raw_len {
                return None;
            }
            written += n;
            input = &input[packed_len..];
        }
        input.is_empty().then_some(written)
    }

    fn hadoop_raw_len(input: &[u8]) -> Option<usize> {
        let mut input = input;
        let mut total = 0usize;
        while input.len() >= Self::HADOOP_PREFIX {
            let raw_len = u32::from_be_bytes(<[u8; 4]>::try_from(&input[..4]).ok()?) as usize;
            let packed_len = u32::from_be_bytes(<[u8; 4]>::try_from(&input[4..8]).ok()?) as usize;
            input = input.get(Self::HADOOP_PREFIX + packed_len..)?;
            total = total.checked_add(raw_len)?;
        }
        input.is_empty().then_some(total)
    }
}

#[cfg(feature = "compression-lz4")]
impl Codec for Lz4Codec {
    fn compression_type(&self) -> CompressionType {
        self.ty
    }

    fn compression_level(&self) -> Option<i32> {
        self.level
    }

    fn minimum_compression_level(&self) -> Option<i32> {
        self.levels().then_some(Self::MIN_LEVEL)
    }

    fn maximum_compression_level(&self) -> Option<i32> {
        self.levels().then_some(Self::MAX_LEVEL)
    }

    fn default_compression_level(&self) -> Option<i32> {
        self.levels().then_some(Self::DEFAULT_LEVEL)
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        match self.ty {
            CompressionType::Lz4Frame => {
                // header, per-block size words, end mark and checksum
                Self::block_bound(input_len) + (input_len / Self::FRAME_BLOCK + 1) * 4 + 32
            }
            CompressionType::Lz4Hadoop => Self::HADOOP_PREFIX + Self::block_bound(input_len),
            _ => Self::block_bound(input_len),
        }
    }

    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        match self.ty {
            CompressionType::Lz4Frame => {
                let mut enc = lz4_flex::frame::FrameEncoder::new(Vec::new());
                enc.write_all(input).map_err(|e| self.err(e))?;
                let produced = enc.finish().map_err(|e| self.err(e))?;
                copy_out("lz4", &produced, output)
            }
            CompressionType::Lz4Hadoop => self.compress_hadoop(input, output),
            _ => lz4_flex::block::compress_into(input, output).map_err(|e| self.err(e)),
        }
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        match self.ty {
            CompressionType::Lz4Frame => {
                read_into("lz4", lz4_flex::frame::FrameDecoder::new(input), output)
            }
            CompressionType::Lz4Hadoop => match Self::decompress_hadoop(input, output) {
                Some(n) => Ok(n),
                // Older writers emitted bare LZ4 blocks under the same name.
                None => lz4_flex::block::decompress_into(input, output).map_err(|e| self.err(e)),
            },
            _ => lz4_flex::block::decompress_into(input, output).map_err(|e| self.err(e)),
        }
    }

    fn decompress_to_vec(&self, input: &[u8], expected_len: Option<usize>) -> Result<Vec<u8>> {
        match self.ty {
            CompressionType::Lz4Frame => {
                read_to_vec("lz4", lz4_flex::frame::FrameDecoder::new(input), expected_len)
            }
            CompressionType::Lz4Hadoop => {
                let len = Self::hadoop_raw_len(input)
                    .or(expected_len)
                    .ok_or_else(|| {
                        Error::InvalidArgument("lz4_hadoop input needs an expected length".into())
                    })?;
                let mut out = vec![0; len];
                let n = self.decompress(input, &mut out)?;
                out.truncate(n);
                Ok(out)
            }
            _ => {
                let len = expected_len
                    .ok_or_else(|| {
                        Error::InvalidArgument("lz4_raw input needs an expected length".into())
                    })?;
                lz4_flex::block::decompress(input, len).map_err(|e| self.err(e))
            }
        }
    }

    fn compress_writer<'a>(&self, writer: Box<dyn Write + 'a>) -> Result<Box<dyn Write + 'a>> {
        if self.ty != CompressionType::Lz4Frame {
            return Err(Error::Unimplemented(format!("streaming compression for {}", self.ty)));
        }
        Ok(Box::new(lz4_flex::frame::FrameEncoder::new(writer).auto_finish()))
    }

    fn decompress_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>> {
        if self.ty != CompressionType::Lz4Frame {
            return Err(Error::Unimplemented(format!("streaming decompression for {}", self.ty)));
        }
        Ok(Box::new(lz4_flex::frame::FrameDecoder::new(reader)))
    }
}

// ============================================================================
// Snappy
// ============================================================================

#[cfg(feature = "compression-snappy")]
struct SnappyCodec;

#[cfg(feature = "compression-snappy")]
impl Codec for SnappyCodec {
    fn compression_type(&self) -> CompressionType {
        CompressionType::Snappy
    }

    fn compression_level(&self) -> Option<i32> {
        None
    }

    fn minimum_compression_level(&self) -> Option<i32> {
        None
    }

    fn maximum_compression_level(&self) -> Option<i32> {
        None
    }

    fn default_compression_level(&self) -> Option<i32> {
        None
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        snap::raw::max_compress_len(input_len)
    }

    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        snap::raw::Encoder::new()
            .compress(input, output)
            .map_err(|e| Error::codec("snappy", e))
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        snap::raw::Decoder::new()
            .decompress(input, output)
            .map_err(|e| Error::codec("snappy", e))
    }

    fn decompress_to_vec(&self, input: &[u8], _expected_len: Option<usize>) -> Result<Vec<u8>> {
        snap::raw::Decoder::new()
            .decompress_vec(input)
            .map_err(|e| Error::codec("snappy", e))
    }
}
