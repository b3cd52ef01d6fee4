//! Decompression of submitted files.
//!
//! Provides a [`Codec`] trait with implementations for gzip, bzip2 and
//! Zstandard. The codec is picked from the file's magic bytes, never from its
//! extension.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::error::ValidatorError;

/// Boxed byte stream a file is read through.
pub type Source = Box<dyn BufRead + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    None,
    Gzip,
    Bzip2,
    Zstd,
}

impl CompressionKind {
    /// Detects the compression of a stream from its first bytes.
    pub fn detect(magic: &[u8]) -> Self {
        match magic {
            [0x1f, 0x8b, ..] => CompressionKind::Gzip,
            [b'B', b'Z', b'h', ..] => CompressionKind::Bzip2,
            [0x28, 0xb5, 0x2f, 0xfd, ..] => CompressionKind::Zstd,
            _ => CompressionKind::None,
        }
    }
}

/// A streaming decompression codec.
pub trait Codec: Send + Sync {
    /// Returns the compression kind for this codec.
    fn kind(&self) -> CompressionKind;

    /// Wraps a compressed stream in a decompressing one.
    fn decoder(&self, input: Source) -> io::Result<Box<dyn Read + Send>>;
}

/// Passthrough for plain text files.
#[derive(Debug, Clone, Copy)]
pub struct NoneCodec;

impl Codec for NoneCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::None
    }

    fn decoder(&self, input: Source) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(input))
    }
}

/// Gzip, including multi-member files produced by concatenation.
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec;

impl Codec for GzipCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Gzip
    }

    fn decoder(&self, input: Source) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(flate2::bufread::MultiGzDecoder::new(input)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bzip2Codec;

impl Codec for Bzip2Codec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Bzip2
    }

    fn decoder(&self, input: Source) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(bzip2::bufread::MultiBzDecoder::new(input)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec;

impl Codec for ZstdCodec {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Zstd
    }

    fn decoder(&self, input: Source) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(zstd::stream::read::Decoder::with_buffer(input)?))
    }
}

/// Returns the codec for the given compression kind.
pub fn codec(kind: CompressionKind) -> &'static dyn Codec {
    match kind {
        CompressionKind::None => &NoneCodec,
        CompressionKind::Gzip => &GzipCodec,
        CompressionKind::Bzip2 => &Bzip2Codec,
        CompressionKind::Zstd => &ZstdCodec,
    }
}

/// Wraps any buffered stream in the decoder its magic bytes call for.
pub fn decode(mut input: Source) -> io::Result<(CompressionKind, Source)> {
    let kind = CompressionKind::detect(input.fill_buf()?);
    if kind == CompressionKind::None {
        return Ok((kind, input));
    }
    let decoder = codec(kind).decoder(input)?;
    Ok((kind, Box::new(BufReader::new(decoder))))
}

/// Opens a submitted file for streaming, decompressing as needed.
pub fn open(path: &Path) -> Result<Source, ValidatorError> {
    let file = File::open(path).map_err(|e| ValidatorError::io(path, e))?;
    let (kind, source) =
        decode(Box::new(BufReader::new(file))).map_err(|e| ValidatorError::io(path, e))?;
    tracing::debug!(path = %path.display(), ?kind, "opened submission file");
    Ok(source)
}
