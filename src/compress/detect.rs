//! Picking a streaming codec for a file.
//!
//! File extensions are checked first, falling back to the leading magic bytes
//! of the stream only when the name says nothing. This avoids reading file
//! headers in the common case.

use super::{create_codec, CodecOptions, CompressionType};
use crate::error::Result;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

struct Signature {
    ty: CompressionType,
    extensions: &'static [&'static str],
    magic: &'static [u8],
}

const SIGNATURES: &[Signature] = &[
    Signature {
        ty: CompressionType::Gzip,
        extensions: &[".gz", ".gzip"],
        magic: &[0x1f, 0x8b],
    },
    Signature {
        ty: CompressionType::Zstd,
        extensions: &[".zst", ".zstd"],
        magic: &[0x28, 0xb5, 0x2f, 0xfd],
    },
    Signature {
        ty: CompressionType::Bz2,
        extensions: &[".bz2", ".bzip2"],
        magic: &[0x42, 0x5a, 0x68],
    },
    Signature {
        ty: CompressionType::Lz4Frame,
        extensions: &[".lz4"],
        magic: &[0x04, 0x22, 0x4d, 0x18],
    },
];

/// Streaming codec implied by the file name, if one is compiled in.
///
/// Matching is case-insensitive and looks only at the final extension, so
/// `logs.tar.gz` is gzip.
#[must_use]
pub fn detect_from_extension(path: impl AsRef<Path>) -> Option<CompressionType> {
    let name = path.as_ref().to_string_lossy().to_lowercase();
    SIGNATURES
        .iter()
        .filter(|sig| sig.ty.is_available())
        .find(|sig| sig.extensions.iter().any(|ext| name.ends_with(ext)))
        .map(|sig| sig.ty)
}

/// Streaming codec whose magic number starts `head`, if one is compiled in.
#[must_use]
pub fn detect_from_magic(head: &[u8]) -> Option<CompressionType> {
    SIGNATURES
        .iter()
        .filter(|sig| sig.ty.is_available())
        .find(|sig| head.starts_with(sig.magic))
        .map(|sig| sig.ty)
}

fn wrap_reader<'a>(ty: CompressionType, reader: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>> {
    match create_codec(ty, &CodecOptions::default())? {
        Some(codec) => codec.decompress_reader(reader),
        None => Ok(reader),
    }
}

/// Wrap `reader` with a decompressor if the path or the content calls for one.
///
/// # Errors
///
/// Returns an error if the detected codec cannot be set up.
///
/// ```no_run
/// use strata::compress::auto_detect_reader;
/// use std::fs::File;
/// # fn main() -> strata::Result<()> {
/// let file = File::open("events.csv.gz")?;
/// let reader = auto_detect_reader(file, "events.csv.gz")?;
/// # Ok(())
/// # }
/// ```
pub fn auto_detect_reader<'a, R: Read + 'a>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read + 'a>> {
    if let Some(ty) = detect_from_extension(&path_hint) {
        return wrap_reader(ty, Box::new(reader));
    }

    let mut buffered = BufReader::new(reader);
    let detected = buffered
        .fill_buf()
        .ok()
        .and_then(detect_from_magic);
    match detected {
        Some(ty) => wrap_reader(ty, Box::new(buffered)),
        None => Ok(Box::new(buffered)),
    }
}

/// Wrap `writer` with a compressor chosen by the path's extension. Without a
/// known extension the writer is only buffered.
///
/// # Errors
///
/// Returns an error if the detected codec cannot be set up.
pub fn auto_detect_writer<'a, W: Write + 'a>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Write + 'a>> {
    if let Some(ty) = detect_from_extension(&path_hint)
        && let Some(codec) = create_codec(ty, &CodecOptions::default())?
    {
        return codec.compress_writer(Box::new(writer));
    }
    Ok(Box::new(BufWriter::new(writer)))
}
