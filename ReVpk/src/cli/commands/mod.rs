use clap::Subcommand;
use std::path::PathBuf;

use crate::vpk::{MANIFEST_DIR, VpkFileName, VpkPair};

pub mod list;
pub mod manifest;
pub mod pack;
pub mod unpack;

#[derive(Subcommand)]
pub enum Commands {
    /// Pack a workspace into a VPK using its build manifest
    Pack {
        /// Locale prefix of the directory file (e.g. english)
        locale: String,

        /// Game DLL target (server or client)
        context: String,

        /// Level name (e.g. mp_rr_box)
        level: String,

        /// Workspace holding the files and the manifest/ directory
        #[arg(default_value = "ship/")]
        workspace: PathBuf,

        /// Output directory for the VPK files
        #[arg(default_value = "vpk/")]
        build_path: PathBuf,

        /// Compression helper threads (-1 for one per core, 0 for none)
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        threads: i32,

        /// Compression level (fastest, faster, default, better, uber)
        #[arg(short, long, default_value = "default")]
        compression: String,

        /// Pack file index to write
        #[arg(short, long, default_value_t = 0)]
        patch: u16,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Unpack a VPK into a workspace and rebuild its manifest
    Unpack {
        /// Directory file (or pack file with --sanitize)
        file: PathBuf,

        /// Output workspace
        #[arg(default_value = "ship/")]
        output: PathBuf,

        /// Resolve a pack file name to its directory file
        #[arg(long)]
        sanitize: bool,

        /// Stop at the first checksum mismatch
        #[arg(long)]
        strict_crc: bool,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// List the entries of a VPK
    List {
        /// Directory file (or pack file with --sanitize)
        file: PathBuf,

        /// Show per-entry sizes, chunks and checksums
        #[arg(short, long)]
        detailed: bool,

        /// Resolve a pack file name to its directory file
        #[arg(long)]
        sanitize: bool,
    },

    /// Generate a default build manifest from a workspace
    Manifest {
        /// Workspace to scan
        workspace: PathBuf,

        /// Manifest name (e.g. englishclient_mp_rr_box)
        name: String,

        /// Overwrite an existing manifest
        #[arg(short, long)]
        force: bool,
    },
}

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Pack {
                locale,
                context,
                level,
                workspace,
                build_path,
                threads,
                compression,
                patch,
                quiet,
            } => pack::execute(&pack::PackArgs {
                locale,
                context,
                level,
                workspace,
                build_path,
                threads: *threads,
                compression,
                patch: *patch,
                quiet: *quiet,
            }),
            Commands::Unpack {
                file,
                output,
                sanitize,
                strict_crc,
                quiet,
            } => unpack::execute(file, output, *sanitize, *strict_crc, *quiet),
            Commands::List {
                file,
                detailed,
                sanitize,
            } => list::execute(file, *detailed, *sanitize),
            Commands::Manifest {
                workspace,
                name,
                force,
            } => manifest::execute(workspace, name, *force),
        }
    }

    /// File the command's log is mirrored to, if it keeps one
    #[must_use]
    pub fn log_file(&self) -> Option<PathBuf> {
        match self {
            Commands::Pack {
                locale,
                context,
                level,
                build_path,
                ..
            } => {
                let pair = VpkPair::new(locale, context, level, 0);
                Some(
                    build_path
                        .join(MANIFEST_DIR)
                        .join("pack_logs")
                        .join(format!("{}.log", pair.base_name())),
                )
            }
            Commands::Unpack { file, output, .. } => {
                let file_name = file.file_name()?.to_string_lossy().into_owned();
                let base_name = VpkFileName::parse(&file_name).map_or_else(
                    || file_name.trim_end_matches(".vpk").to_string(),
                    |parsed| parsed.base_name(),
                );
                Some(
                    output
                        .join(MANIFEST_DIR)
                        .join("unpack_logs")
                        .join(format!("{base_name}.log")),
                )
            }
            Commands::List { .. } | Commands::Manifest { .. } => None,
        }
    }
}
