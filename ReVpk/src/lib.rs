//! # ReVpk
//!
//! A pure-Rust library for building and extracting Respawn VPK packed stores.
//!
//! A store is a directory file (`englishclient_mp_rr_box.bsp.pak000_dir.vpk`)
//! describing every entry, plus one or more pack files
//! (`client_mp_rr_box.bsp.pak000_000.vpk`) holding the entry data in
//! compressed, deduplicated chunks of at most 1 MiB.
//!
//! ## Quick Start
//!
//! ### Packing a workspace
//!
//! ```no_run
//! use std::path::Path;
//! use revpk::vpk::{CompressionLevel, PackedStoreBuilder, VpkPair};
//!
//! // Reads ship/manifest/englishclient_mp_rr_box.json
//! let pair = VpkPair::new("english", "client", "mp_rr_box", 0);
//!
//! let mut builder = PackedStoreBuilder::new();
//! builder.init_lz_encoder(-1, CompressionLevel::Default)?;
//! let report = builder.pack_store(&pair, Path::new("ship"), Path::new("vpk"))?;
//! println!("Packed {} entries", report.entry_count());
//! # Ok::<(), revpk::Error>(())
//! ```
//!
//! ### Unpacking a store
//!
//! ```no_run
//! use std::path::Path;
//! use revpk::vpk::{PackedStoreBuilder, VpkDir};
//!
//! let dir = VpkDir::open("vpk/englishclient_mp_rr_box.bsp.pak000_dir.vpk");
//!
//! let mut builder = PackedStoreBuilder::new();
//! builder.init_lz_decoder()?;
//! let report = builder.unpack_store(&dir, Path::new("ship"))?;
//! assert!(report.is_complete());
//! # Ok::<(), revpk::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `revpk` command-line binary

pub mod error;
pub mod utils;
pub mod vpk;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::vpk::{
        ChecksumPolicy, CompressionLevel, IgnoreList, Manifest, ManifestEntry, PackReport,
        PackedStoreBuilder, UnpackReport, VpkChunkDescriptor, VpkDir, VpkEntryBlock, VpkPair,
        VpkPhase, VpkProgress,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
