//! Types for VPK directory and pack file handling

use std::io::{Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use super::{ENTRY_MAX_LEN, PACKFILEINDEX_END, PACKFILEINDEX_SEP};

/// Load flags stored on every chunk descriptor
pub mod load_flags {
    pub const NONE: u32 = 0;
    pub const VISIBLE: u32 = 1 << 0;
    pub const CACHE: u32 = 1 << 8;
    pub const ACACHE_UNK0: u32 = 1 << 10;

    /// Flags used when a manifest entry does not specify any
    pub const DEFAULT: u32 = VISIBLE | CACHE;
}

/// Texture flags stored on every chunk descriptor (only meaningful for textures)
pub mod texture_flags {
    pub const NONE: u16 = 0;
    pub const DEFAULT: u16 = 1 << 3;
    pub const ENVIRONMENT_MAP: u16 = 1 << 10;
}

/// One contiguous, optionally compressed, byte range of an entry in a pack file.
///
/// A chunk is stored uncompressed when `compressed_size == uncompressed_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VpkChunkDescriptor {
    pub load_flags: u32,
    /// Texture flags (only used if the entry is a texture)
    pub texture_flags: u16,
    /// Offset in the pack file
    pub pack_file_offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl VpkChunkDescriptor {
    /// Size of a descriptor record in the directory tree
    pub const ON_DISK_SIZE: usize = 30;

    #[must_use]
    pub fn new(
        load_flags: u32,
        texture_flags: u16,
        pack_file_offset: u64,
        compressed_size: u64,
        uncompressed_size: u64,
    ) -> Self {
        Self {
            load_flags,
            texture_flags,
            pack_file_offset,
            compressed_size,
            uncompressed_size,
        }
    }

    /// Read a descriptor record from a directory tree stream
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            load_flags: reader.read_u32::<LittleEndian>()?,
            texture_flags: reader.read_u16::<LittleEndian>()?,
            pack_file_offset: reader.read_u64::<LittleEndian>()?,
            compressed_size: reader.read_u64::<LittleEndian>()?,
            uncompressed_size: reader.read_u64::<LittleEndian>()?,
        })
    }

    /// Write the descriptor record to a directory tree stream
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.load_flags)?;
        writer.write_u16::<LittleEndian>(self.texture_flags)?;
        writer.write_u64::<LittleEndian>(self.pack_file_offset)?;
        writer.write_u64::<LittleEndian>(self.compressed_size)?;
        writer.write_u64::<LittleEndian>(self.uncompressed_size)?;
        Ok(())
    }

    /// Returns true if the chunk data in the pack file is compressed
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.compressed_size != self.uncompressed_size
    }

    /// Zero-sized descriptors only ever stand in for empty entries
    fn is_placeholder(&self) -> bool {
        self.compressed_size == 0 && self.uncompressed_size == 0
    }

    /// Check the descriptor can be read back into an entry buffer
    pub fn validate(&self, entry: &str, chunk: usize) -> Result<()> {
        if self.compressed_size > self.uncompressed_size
            || self.uncompressed_size > ENTRY_MAX_LEN as u64
        {
            return Err(Error::InvalidChunkDescriptor {
                entry: entry.to_string(),
                chunk,
                compressed: self.compressed_size,
                uncompressed: self.uncompressed_size,
            });
        }
        Ok(())
    }
}

/// An asset packed into a VPK.
///
/// `Clone` copies the fragment list; two entry blocks never share fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpkEntryBlock {
    /// CRC32 of the uncompressed entry
    pub file_crc: u32,
    pub preload_size: u16,
    /// Index of the pack file that contains this entry
    pub pack_file_index: u16,
    /// Every chunk of the entry, in file order
    pub fragments: Vec<VpkChunkDescriptor>,
    /// Path of the entry relative to the VPK root, using `/` separators
    pub entry_path: String,
}

impl VpkEntryBlock {
    /// Build an entry block from in-memory file contents.
    ///
    /// The contents are carved into [`ENTRY_MAX_LEN`] sized fragments laid out
    /// back to back from `pack_file_offset`, all stored uncompressed. The
    /// builder adjusts offsets and sizes as chunks get compressed and
    /// deduplicated.
    #[must_use]
    pub fn new(
        data: &[u8],
        pack_file_offset: u64,
        preload_size: u16,
        pack_file_index: u16,
        load_flags: u32,
        texture_flags: u16,
        entry_path: impl Into<String>,
    ) -> Self {
        let mut offset = pack_file_offset;
        let fragments = data
            .chunks(ENTRY_MAX_LEN)
            .map(|chunk| {
                let size = chunk.len() as u64;
                let descriptor =
                    VpkChunkDescriptor::new(load_flags, texture_flags, offset, size, size);
                offset += size;
                descriptor
            })
            .collect();

        Self {
            file_crc: crc32fast::hash(data),
            preload_size,
            pack_file_index,
            fragments,
            entry_path: entry_path.into(),
        }
    }

    /// Build an entry block from a source file on disk.
    ///
    /// Returns the block together with the file contents, which the caller
    /// slices along the block's fragments.
    pub fn from_source_file(
        source: &Path,
        pack_file_offset: u64,
        preload_size: u16,
        pack_file_index: u16,
        load_flags: u32,
        texture_flags: u16,
        entry_path: impl Into<String>,
    ) -> Result<(Self, Vec<u8>)> {
        let data = std::fs::read(source)?;
        let block = Self::new(
            &data,
            pack_file_offset,
            preload_size,
            pack_file_index,
            load_flags,
            texture_flags,
            entry_path,
        );
        Ok((block, data))
    }

    /// Read an entry record (everything after the file name) from a directory tree stream
    pub fn read_from<R: Read>(reader: &mut R, entry_path: impl Into<String>) -> Result<Self> {
        let entry_path = entry_path.into();
        let file_crc = reader.read_u32::<LittleEndian>()?;
        let preload_size = reader.read_u16::<LittleEndian>()?;
        let pack_file_index = reader.read_u16::<LittleEndian>()?;

        let mut fragments = Vec::new();
        loop {
            let descriptor = VpkChunkDescriptor::read_from(reader)?;
            if !descriptor.is_placeholder() {
                fragments.push(descriptor);
            }

            match reader.read_u16::<LittleEndian>()? {
                PACKFILEINDEX_END => break,
                PACKFILEINDEX_SEP => {}
                marker => {
                    return Err(Error::MalformedDirectoryTree(format!(
                        "unexpected marker 0x{marker:04X} after chunk {} of '{entry_path}'",
                        fragments.len()
                    )));
                }
            }
        }

        Ok(Self {
            file_crc,
            preload_size,
            pack_file_index,
            fragments,
            entry_path,
        })
    }

    /// Write the entry record (everything after the file name) to a directory tree stream.
    ///
    /// Returns the number of descriptors written.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<usize> {
        writer.write_u32::<LittleEndian>(self.file_crc)?;
        writer.write_u16::<LittleEndian>(self.preload_size)?;
        writer.write_u16::<LittleEndian>(self.pack_file_index)?;

        if self.fragments.is_empty() {
            // The reader expects at least one descriptor per entry
            VpkChunkDescriptor::default().write_to(writer)?;
            writer.write_u16::<LittleEndian>(PACKFILEINDEX_END)?;
            return Ok(1);
        }

        let last = self.fragments.len() - 1;
        for (i, descriptor) in self.fragments.iter().enumerate() {
            descriptor.write_to(writer)?;
            let marker = if i == last {
                PACKFILEINDEX_END
            } else {
                PACKFILEINDEX_SEP
            };
            writer.write_u16::<LittleEndian>(marker)?;
        }

        Ok(self.fragments.len())
    }

    /// Total size of the entry once reassembled
    #[must_use]
    pub fn uncompressed_size(&self) -> u64 {
        self.fragments.iter().map(|f| f.uncompressed_size).sum()
    }

    /// Number of bytes the entry's chunks occupy in the pack file
    #[must_use]
    pub fn compressed_size(&self) -> u64 {
        self.fragments.iter().map(|f| f.compressed_size).sum()
    }
}

/// The VPK directory file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VpkDirHeader {
    /// File magic
    pub header_marker: u32,
    pub major_version: u16,
    pub minor_version: u16,
    /// Directory tree size, header excluded
    pub directory_size: u32,
    pub signature_size: u32,
}

impl VpkDirHeader {
    /// Header for a directory tree of `directory_size` bytes in the supported version
    #[must_use]
    pub fn new(directory_size: u32) -> Self {
        Self {
            header_marker: super::HEADER_MARKER,
            major_version: super::MAJOR_VERSION,
            minor_version: super::MINOR_VERSION,
            directory_size,
            signature_size: 0,
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            header_marker: reader.read_u32::<LittleEndian>()?,
            major_version: reader.read_u16::<LittleEndian>()?,
            minor_version: reader.read_u16::<LittleEndian>()?,
            directory_size: reader.read_u32::<LittleEndian>()?,
            signature_size: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.header_marker)?;
        writer.write_u16::<LittleEndian>(self.major_version)?;
        writer.write_u16::<LittleEndian>(self.minor_version)?;
        writer.write_u32::<LittleEndian>(self.directory_size)?;
        writer.write_u32::<LittleEndian>(self.signature_size)?;
        Ok(())
    }

    /// Returns true if this is a directory file we support
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.header_marker == super::HEADER_MARKER
            && self.major_version == super::MAJOR_VERSION
            && self.minor_version == super::MINOR_VERSION
    }
}

/// Progress information during VPK operations
#[derive(Debug, Clone)]
pub struct VpkProgress {
    /// Current operation phase
    pub phase: VpkPhase,
    /// Current item number (1-indexed)
    pub current: usize,
    /// Total number of items
    pub total: usize,
    /// Current entry being processed (if applicable)
    pub current_file: Option<String>,
}

impl VpkProgress {
    #[must_use]
    pub fn new(phase: VpkPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: None,
        }
    }

    /// Create a progress update with an entry name
    #[must_use]
    pub fn with_file(
        phase: VpkPhase,
        current: usize,
        total: usize,
        file: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: Some(file.into()),
        }
    }
}

/// Phase of a VPK operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpkPhase {
    /// Resolving the build manifest
    ReadingManifest,
    /// Chunking, compressing and writing entries to the pack file
    PackingEntries,
    /// Writing the directory tree
    WritingDirectory,
    /// Reading, decompressing and verifying entries
    UnpackingEntries,
    /// Operation complete
    Complete,
}

impl VpkPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadingManifest => "Reading manifest",
            Self::PackingEntries => "Packing entries",
            Self::WritingDirectory => "Writing directory tree",
            Self::UnpackingEntries => "Unpacking entries",
            Self::Complete => "Complete",
        }
    }
}
