//! Chunk codec
//!
//! Chunks are compressed one by one with a window capped at
//! `1 << DICT_SIZE_LOG2` bytes, so a chunk never references data outside
//! itself and the game can decode it into a single [`ENTRY_MAX_LEN`] buffer.
//!
//! [`ENTRY_MAX_LEN`]: super::ENTRY_MAX_LEN

use std::fmt;
use std::str::FromStr;

use zstd::bulk::{Compressor, Decompressor};
use zstd::stream::raw::{CParameter, DParameter};

use super::DICT_SIZE_LOG2;
use crate::error::{Error, Result};

/// Named compression levels accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    Fastest,
    Faster,
    #[default]
    Default,
    Better,
    Uber,
}

impl CompressionLevel {
    /// All levels, fastest first
    pub const ALL: [Self; 5] = [
        Self::Fastest,
        Self::Faster,
        Self::Default,
        Self::Better,
        Self::Uber,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fastest => "fastest",
            Self::Faster => "faster",
            Self::Default => "default",
            Self::Better => "better",
            Self::Uber => "uber",
        }
    }

    /// The codec level this name maps to
    #[must_use]
    pub fn codec_level(self) -> i32 {
        match self {
            Self::Fastest => 1,
            Self::Faster => 3,
            Self::Default => 9,
            Self::Better => 15,
            Self::Uber => 19,
        }
    }

    /// Parse a level name, falling back to [`CompressionLevel::Default`]
    #[must_use]
    pub fn parse_lossy(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Compression level '{name}' not supported; using '{}'",
                Self::Default.as_str()
            );
            Self::Default
        })
    }
}

impl FromStr for CompressionLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::CompressionFailed(format!("unknown compression level '{s}'")))
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a helper thread count, where a negative count means one per core
fn helper_threads(max_helper_threads: i32) -> u32 {
    match u32::try_from(max_helper_threads) {
        Ok(threads) => threads,
        Err(_) => std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1),
    }
}

/// Chunk compressor
pub struct LzEncoder {
    compressor: Compressor<'static>,
    level: CompressionLevel,
    helper_threads: u32,
}

impl LzEncoder {
    /// Create an encoder.
    ///
    /// `max_helper_threads` of 0 compresses on the calling thread, a negative
    /// value uses one helper per available core.
    ///
    /// # Errors
    /// Returns an error if the codec rejects the parameters.
    pub fn new(max_helper_threads: i32, level: CompressionLevel) -> Result<Self> {
        let codec_err = |e: std::io::Error| Error::CompressionFailed(e.to_string());

        let helper_threads = helper_threads(max_helper_threads);
        let mut compressor = Compressor::new(level.codec_level()).map_err(codec_err)?;
        compressor
            .set_parameter(CParameter::WindowLog(DICT_SIZE_LOG2))
            .map_err(codec_err)?;
        if helper_threads > 0 {
            compressor
                .set_parameter(CParameter::NbWorkers(helper_threads))
                .map_err(codec_err)?;
        }

        Ok(Self {
            compressor,
            level,
            helper_threads,
        })
    }

    #[must_use]
    pub fn helper_threads(&self) -> u32 {
        self.helper_threads
    }

    /// Compress one chunk
    ///
    /// # Errors
    /// Returns an error if the codec fails.
    pub fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.compressor
            .compress(data)
            .map_err(|e| Error::CompressionFailed(e.to_string()))
    }
}

impl fmt::Debug for LzEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LzEncoder")
            .field("level", &self.level)
            .field("helper_threads", &self.helper_threads)
            .finish_non_exhaustive()
    }
}

/// Chunk decompressor
pub struct LzDecoder {
    decompressor: Decompressor<'static>,
}

impl LzDecoder {
    /// Create a decoder accepting windows up to `1 << DICT_SIZE_LOG2` bytes.
    ///
    /// # Errors
    /// Returns an error if the codec rejects the parameters.
    pub fn new() -> Result<Self> {
        let codec_err = |e: std::io::Error| Error::DecompressionFailed {
            entry: String::new(),
            chunk: 0,
            message: e.to_string(),
        };

        let mut decompressor = Decompressor::new().map_err(codec_err)?;
        decompressor
            .set_parameter(DParameter::WindowLogMax(DICT_SIZE_LOG2))
            .map_err(codec_err)?;

        Ok(Self { decompressor })
    }

    /// Decompress one chunk into a buffer of at most `capacity` bytes.
    ///
    /// Errors carry the codec message only; the caller knows which entry and
    /// chunk it was decoding.
    ///
    /// # Errors
    /// Returns the codec error message if the data is corrupt or too large.
    pub fn decompress(&mut self, data: &[u8], capacity: usize) -> std::result::Result<Vec<u8>, String> {
        self.decompressor
            .decompress(data, capacity)
            .map_err(|e| e.to_string())
    }
}

impl fmt::Debug for LzDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LzDecoder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!("uber".parse::<CompressionLevel>().unwrap(), CompressionLevel::Uber);
        assert_eq!("Fastest".parse::<CompressionLevel>().unwrap(), CompressionLevel::Fastest);
        assert!("ultra".parse::<CompressionLevel>().is_err());
        assert_eq!(CompressionLevel::parse_lossy("ultra"), CompressionLevel::Default);
        assert_eq!(CompressionLevel::Default.codec_level(), 9);
    }

    #[test]
    fn test_compress_decompress() {
        let data: Vec<u8> = b"revpk chunk data ".repeat(4096);

        let mut encoder = LzEncoder::new(0, CompressionLevel::Fastest).unwrap();
        let compressed = encoder.compress(&data).unwrap();
        assert!(compressed.len() < data.len());

        let mut decoder = LzDecoder::new().unwrap();
        let restored = decoder.decompress(&compressed, data.len()).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_helper_threads() {
        let encoder = LzEncoder::new(2, CompressionLevel::Default).unwrap();
        assert_eq!(encoder.helper_threads(), 2);
        assert!(helper_threads(-1) >= 1);
    }

    #[test]
    fn test_corrupt_data_fails() {
        let mut decoder = LzDecoder::new().unwrap();
        assert!(decoder.decompress(b"definitely not a frame", 64).is_err());
    }
}
