//! Compression codecs for source objects.
//!
//! Objects are decompressed fully into memory before decoding; a day's
//! partition is a handful of small files.

use std::borrow::Cow;
use std::io::Read;

use crate::config::CompressionFormat;

/// Error type for decompression operations.
#[derive(Debug)]
pub struct DecompressionError {
    pub message: String,
}

impl std::fmt::Display for DecompressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DecompressionError {}

impl From<std::io::Error> for DecompressionError {
    fn from(e: std::io::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

/// Trait for compression codecs that can decompress object bytes.
pub trait CompressionCodec: Send + Sync {
    /// Decompress `data`, borrowing it when no work is needed.
    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>, DecompressionError>;

    /// Human-readable name of this codec (for logging).
    fn name(&self) -> &'static str;
}

/// Gzip compression codec using flate2.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec;

impl CompressionCodec for GzipCodec {
    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>, DecompressionError> {
        let mut decoder = flate2::read::MultiGzDecoder::new(data);
        let mut buf = Vec::new();
        decoder.read_to_end(&mut buf)?;
        Ok(Cow::Owned(buf))
    }

    fn name(&self) -> &'static str {
        "gzip"
    }
}

/// Zstandard compression codec using zstd.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdCodec;

impl CompressionCodec for ZstdCodec {
    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>, DecompressionError> {
        let mut decoder = zstd::stream::Decoder::new(data).map_err(|e| DecompressionError {
            message: format!("Failed to create zstd decoder: {e}"),
        })?;
        let mut buf = Vec::new();
        decoder.read_to_end(&mut buf)?;
        Ok(Cow::Owned(buf))
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

/// No-op codec for uncompressed data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCodec;

impl CompressionCodec for NoopCodec {
    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>, DecompressionError> {
        Ok(Cow::Borrowed(data))
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

impl CompressionFormat {
    /// Codec for this format.
    pub fn codec(self) -> Box<dyn CompressionCodec> {
        match self {
            CompressionFormat::None => Box::new(NoopCodec),
            CompressionFormat::Gzip => Box::new(GzipCodec),
            CompressionFormat::Zstd => Box::new(ZstdCodec),
        }
    }
}
