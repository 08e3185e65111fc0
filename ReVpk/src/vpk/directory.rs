//! VPK directory file reading and writing

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use super::naming::{LANGUAGE_NAMES, VpkFileKind, VpkFileName};
use super::tree::{TreeBuilder, read_tree};
use super::{HEADER_SIZE, VpkDirHeader, VpkEntryBlock};
use crate::error::{Error, Result};

/// A loaded VPK directory file
///
/// Loading never panics or returns early on bad input. A directory file that
/// cannot be opened or decoded yields a `VpkDir` whose [`failed`](Self::failed)
/// flag is set, and which unpacking refuses to use.
#[derive(Debug, Clone, Default)]
pub struct VpkDir {
    pub header: VpkDirHeader,
    /// Path the directory file was loaded from (or written to)
    pub dir_file_path: PathBuf,
    pub entry_blocks: Vec<VpkEntryBlock>,
    /// Every pack file index referenced by the tree
    pub pak_file_indices: BTreeSet<u16>,
    failure: Option<String>,
}

impl VpkDir {
    /// Load a directory file from disk
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(data) => Self::from_bytes(path, &data),
            Err(e) => Self::with_failure(path, format!("unable to open: {e}")),
        }
    }

    /// Load a directory file, optionally resolving a pack file name to its
    /// directory file first.
    ///
    /// With `sanitize` set and a pack file name such as
    /// `client_mp_rr_box.bsp.pak000_003.vpk`, the matching directory file is
    /// looked up next to it. Pack files carry no locale, so each supported
    /// locale is probed in order until a directory file exists.
    pub fn open_sanitized(path: impl AsRef<Path>, sanitize: bool) -> Self {
        let path = path.as_ref();
        if !sanitize {
            return Self::open(path);
        }

        let parsed = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(VpkFileName::parse);

        let Some(parsed) = parsed.filter(|p| matches!(p.kind, VpkFileKind::Pack(_))) else {
            // Not a pack file name; take the path as given
            return Self::open(path);
        };

        if parsed.locale.is_some() {
            return Self::open(path.with_file_name(parsed.dir_file_name()));
        }

        for locale in LANGUAGE_NAMES {
            let candidate = path.with_file_name(parsed.dir_file_name_for_locale(locale));
            if candidate.is_file() {
                tracing::info!("Resolved '{}' to '{}'", path.display(), candidate.display());
                return Self::open(candidate);
            }
        }

        Self::with_failure(path, "corresponding directory file not found".to_string())
    }

    /// Decode a directory file from memory
    pub fn from_bytes(path: impl AsRef<Path>, data: &[u8]) -> Self {
        let path = path.as_ref();
        match Self::parse(data) {
            Ok((header, entry_blocks)) => {
                let pak_file_indices = entry_blocks.iter().map(|b| b.pack_file_index).collect();
                Self {
                    header,
                    dir_file_path: path.to_path_buf(),
                    entry_blocks,
                    pak_file_indices,
                    failure: None,
                }
            }
            Err(e) => Self::with_failure(path, e.to_string()),
        }
    }

    fn with_failure(path: &Path, reason: String) -> Self {
        tracing::error!("Failed to load VPK directory file '{}': {reason}", path.display());
        Self {
            dir_file_path: path.to_path_buf(),
            failure: Some(reason),
            ..Self::default()
        }
    }

    fn parse(data: &[u8]) -> Result<(VpkDirHeader, Vec<VpkEntryBlock>)> {
        if data.len() < HEADER_SIZE {
            return Err(Error::TruncatedDirectory {
                declared: HEADER_SIZE as u64,
                available: data.len() as u64,
            });
        }

        let header = VpkDirHeader::read_from(&mut &data[..HEADER_SIZE])?;
        if !header.is_supported() {
            return Err(Error::InvalidDirectoryHeader {
                marker: header.header_marker,
                major: header.major_version,
                minor: header.minor_version,
            });
        }

        let available = data.len() - HEADER_SIZE;
        let declared = header.directory_size as usize;
        if available < declared {
            return Err(Error::TruncatedDirectory {
                declared: declared as u64,
                available: available as u64,
            });
        }

        let tree = &data[HEADER_SIZE..HEADER_SIZE + declared];
        let entry_blocks = read_tree(&mut Cursor::new(tree)).map_err(|e| match e {
            Error::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                Error::MalformedDirectoryTree(format!(
                    "tree ends before its terminator ({declared} bytes)"
                ))
            }
            other => other,
        })?;

        Ok((header, entry_blocks))
    }

    /// Returns true if the directory file could not be loaded
    #[must_use]
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Why loading failed, if it did
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Pack file name for the given index, derived from the directory file
    /// name with the locale removed
    #[must_use]
    pub fn pack_file_name_for_index(&self, pack_file_index: u16) -> String {
        let file_name = self
            .dir_file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        match VpkFileName::parse(&file_name) {
            Some(parsed) => parsed.pack_file_name(pack_file_index),
            None => file_name.replace("_dir.vpk", &format!("_{pack_file_index:03}.vpk")),
        }
    }

    /// Pack file path for the given index, next to the directory file
    #[must_use]
    pub fn pack_file_path_for_index(&self, pack_file_index: u16) -> PathBuf {
        self.dir_file_path
            .with_file_name(self.pack_file_name_for_index(pack_file_index))
    }

    /// Name identifying the store, e.g. `englishclient_mp_rr_box`
    #[must_use]
    pub fn base_name(&self) -> String {
        let file_name = self
            .dir_file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        VpkFileName::parse(&file_name).map_or_else(
            || file_name.trim_end_matches(".vpk").to_string(),
            |parsed| parsed.base_name(),
        )
    }

    /// Encode a complete directory file (header and tree) for the given
    /// entries. Returns the header, the file bytes and the number of
    /// descriptors written.
    ///
    /// # Errors
    /// Returns an error if two entries share a path or the tree does not fit
    /// the header's 32-bit size field.
    pub fn serialize(entry_blocks: &[VpkEntryBlock]) -> Result<(VpkDirHeader, Vec<u8>, usize)> {
        let tree = TreeBuilder::build(entry_blocks)?;

        let mut bytes = vec![0u8; HEADER_SIZE];
        let descriptors = tree.write_tree(&mut bytes)?;

        let directory_size = u32::try_from(bytes.len() - HEADER_SIZE).map_err(|_| {
            Error::MalformedDirectoryTree(format!(
                "directory tree of {} bytes exceeds the header size field",
                bytes.len() - HEADER_SIZE
            ))
        })?;

        let header = VpkDirHeader::new(directory_size);
        header.write_to(&mut &mut bytes[..HEADER_SIZE])?;

        Ok((header, bytes, descriptors))
    }

    /// Write a directory file for the given entries and make this `VpkDir`
    /// describe it. Returns the number of descriptors written.
    ///
    /// # Errors
    /// Returns an error if the tree cannot be encoded or the file cannot be
    /// written.
    pub fn build_directory_file(
        &mut self,
        directory_path: impl AsRef<Path>,
        entry_blocks: &[VpkEntryBlock],
    ) -> Result<usize> {
        let directory_path = directory_path.as_ref();
        let (header, bytes, descriptors) = Self::serialize(entry_blocks)?;

        let mut file = fs::File::create(directory_path)?;
        file.write_all(&bytes)?;
        file.flush()?;

        tracing::info!(
            "Built directory '{}' totaling {} bytes with {} entries and {} descriptors",
            directory_path.display(),
            bytes.len(),
            entry_blocks.len(),
            descriptors
        );

        self.header = header;
        self.dir_file_path = directory_path.to_path_buf();
        self.entry_blocks = entry_blocks.to_vec();
        self.pak_file_indices = entry_blocks.iter().map(|b| b.pack_file_index).collect();
        self.failure = None;

        Ok(descriptors)
    }
}
