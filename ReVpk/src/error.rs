//! Error types for `ReVpk`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `ReVpk` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Directory Tree Errors ====================
    /// The directory file header does not carry the expected marker or version.
    #[error(
        "unsupported VPK directory file: marker 0x{marker:08X}, version {major}.{minor} (expected 0x55AA1234, version 2.3)"
    )]
    InvalidDirectoryHeader {
        /// The header marker found in the file.
        marker: u32,
        /// The major version found in the file.
        major: u16,
        /// The minor version found in the file.
        minor: u16,
    },

    /// The directory file holds fewer bytes than its header declares.
    #[error("truncated VPK directory file: {declared} bytes declared, {available} available")]
    TruncatedDirectory {
        /// Number of bytes the header (or a record) requires.
        declared: u64,
        /// Number of bytes actually present.
        available: u64,
    },

    /// The directory tree body could not be decoded.
    #[error("malformed VPK directory tree: {0}")]
    MalformedDirectoryTree(String),

    /// Unpacking was requested on a directory tree that failed to load.
    #[error("directory tree '{path}' failed to load: {reason}")]
    DirectoryTreeFailed {
        /// Path of the directory file.
        path: PathBuf,
        /// Why the tree is unusable.
        reason: String,
    },

    /// Two entries resolve to the same slot in the directory tree.
    #[error("duplicate entry in directory tree: {0}")]
    DuplicateEntry(String),

    // ==================== Chunk Errors ====================
    /// A chunk descriptor holds sizes that cannot describe a valid chunk.
    #[error(
        "invalid chunk descriptor {chunk} of '{entry}': compressed {compressed} bytes, uncompressed {uncompressed} bytes"
    )]
    InvalidChunkDescriptor {
        /// Entry path owning the chunk.
        entry: String,
        /// Index of the chunk within the entry.
        chunk: usize,
        /// Stored compressed size.
        compressed: u64,
        /// Stored uncompressed size.
        uncompressed: u64,
    },

    /// The codec failed to compress a chunk.
    #[error("compression failed: {0}")]
    CompressionFailed(String),

    /// The codec failed to decompress a chunk.
    #[error("decompression failed for chunk {chunk} of '{entry}': {message}")]
    DecompressionFailed {
        /// Entry path owning the chunk.
        entry: String,
        /// Index of the chunk within the entry.
        chunk: usize,
        /// The codec error message.
        message: String,
    },

    /// A reconstructed entry does not match its stored CRC32.
    #[error("checksum mismatch for '{entry}': computed 0x{computed:08X}, expected 0x{expected:08X}")]
    ChecksumMismatch {
        /// Entry path.
        entry: String,
        /// CRC32 stored in the directory tree.
        expected: u32,
        /// CRC32 of the reconstructed bytes.
        computed: u32,
    },

    /// The encoder or decoder was used before being initialized.
    #[error("{0} used before initialization")]
    CodecNotInitialized(&'static str),

    // ==================== Manifest Errors ====================
    /// No build manifest exists for the requested VPK.
    #[error("build manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// JSON parsing or serialization error in a build manifest.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    // ==================== File System Errors ====================
    /// An entry path cannot be stored in or restored from a VPK.
    #[error("invalid entry path: {0}")]
    InvalidEntryPath(String),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDir(String),
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDir(err.to_string())
    }
}

/// A specialized Result type for `ReVpk` operations.
pub type Result<T> = std::result::Result<T, Error>;
