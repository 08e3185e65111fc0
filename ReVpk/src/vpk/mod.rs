//! VPK packed store
//!
//! VPK's are created in pairs of a directory file and pack file(s):
//! - `<locale><target>_<level>.bsp.pak000_dir.vpk` is the directory file.
//! - `<target>_<level>.bsp.pak000_<patch>.vpk` is a pack file.
//!
//! The directory file holds the entire directory tree. Every asset is an
//! entry ([`VpkEntryBlock`]) made of one or more chunks
//! ([`VpkChunkDescriptor`]) of at most [`ENTRY_MAX_LEN`] bytes, each stored
//! compressed or raw in a pack file.

mod builder;
mod codec;
mod dedup;
mod directory;
pub mod manifest;
pub mod naming;
mod tree;
mod types;

pub use builder::{ChecksumPolicy, PackReport, PackedStoreBuilder, ProgressCallback, UnpackReport};
pub use codec::{CompressionLevel, LzDecoder, LzEncoder};
pub use dedup::{ChunkHash, ChunkIndex};
pub use directory::VpkDir;
pub use manifest::{IgnoreList, Manifest, ManifestEntry, ResolvedEntry};
pub use naming::{VpkFileKind, VpkFileName, VpkPair};
pub use tree::TreeBuilder;
pub use types::*;

/// Directory file header marker
pub const HEADER_MARKER: u32 = 0x55AA1234;

/// Supported directory file major version
pub const MAJOR_VERSION: u16 = 2;

/// Supported directory file minor version
pub const MINOR_VERSION: u16 = 3;

/// Size of the on-disk directory header
pub const HEADER_SIZE: usize = 16;

/// Log2 of the codec dictionary (window) size
pub const DICT_SIZE_LOG2: u32 = 20;

/// Maximum number of bytes in a single chunk (the engine's decompress buffer)
pub const ENTRY_MAX_LEN: usize = 1024 * 1024;

/// Exclusive upper bound for pack file (patch) indices
pub const PACKFILEPATCH_MAX: u16 = 512;

/// Marker written between two chunk descriptors of an entry
pub const PACKFILEINDEX_SEP: u16 = 0x0000;

/// Marker written after the last chunk descriptor of an entry
pub const PACKFILEINDEX_END: u16 = 0xFFFF;

/// Workspace file listing paths that never get packed
pub const IGNORE_FILE: &str = ".vpkignore";

/// Workspace subdirectory holding build manifests and logs
pub const MANIFEST_DIR: &str = "manifest";
