//! Packed store builder
//!
//! Packing reads every manifest entry, carves it into chunks, compresses and
//! deduplicates the chunks, appends them to a pack file and finally writes the
//! directory file describing where everything went. Unpacking walks a loaded
//! directory tree and reassembles every entry from its pack file.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::codec::{CompressionLevel, LzDecoder, LzEncoder};
use super::dedup::{ChunkHash, ChunkIndex};
use super::manifest::{IgnoreList, Manifest, ResolvedEntry};
use super::naming::VpkPair;
use super::tree::split_entry_path;
use super::{
    ENTRY_MAX_LEN, VpkChunkDescriptor, VpkDir, VpkEntryBlock, VpkPhase, VpkProgress,
};
use crate::error::{Error, Result};
use crate::utils::entry_output_path;

/// Progress callback type
pub type ProgressCallback<'a> = &'a (dyn Fn(&VpkProgress) + Sync + Send);

/// File written next to client stores so the front end picks them up
const ENABLE_FILE: &str = "enable.txt";
const ENABLE_FILE_CONTENTS: &str = "1 \r\n";

/// What to do when a restored entry does not match its stored CRC32
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Skip the entry, record it as failed and keep unpacking
    #[default]
    Continue,
    /// Stop unpacking with [`Error::ChecksumMismatch`]
    Abort,
}

/// Result of packing a store
#[derive(Debug, Clone, Default)]
pub struct PackReport {
    pub pack_file_path: PathBuf,
    pub dir_file_path: PathBuf,
    /// Entries written to the directory tree
    pub entry_blocks: Vec<VpkEntryBlock>,
    /// Chunk descriptors written to the directory tree
    pub descriptors: usize,
    /// Chunks that reused an already written chunk
    pub shared_chunks: usize,
    /// Pack file bytes saved by shared chunks
    pub shared_bytes: u64,
    pub pack_file_size: u64,
    pub dir_file_size: u64,
}

impl PackReport {
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entry_blocks.len()
    }
}

/// Result of unpacking a store
#[derive(Debug, Clone, Default)]
pub struct UnpackReport {
    /// Entries written to disk
    pub restored: Vec<String>,
    /// Entries that could not be restored (entry path, error message)
    pub failures: Vec<(String, String)>,
    /// Bytes written across all restored entries
    pub bytes_written: u64,
    /// Rebuilt build manifest
    pub manifest_path: Option<PathBuf>,
}

impl UnpackReport {
    /// Returns true if every entry was restored
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the total number of entries (restored + failed)
    #[must_use]
    pub fn total_entries(&self) -> usize {
        self.restored.len() + self.failures.len()
    }
}

/// Builds and extracts VPK stores
///
/// Owns the codec state and the chunk index. The encoder and decoder are set
/// up explicitly with [`init_lz_encoder`](Self::init_lz_encoder) and
/// [`init_lz_decoder`](Self::init_lz_decoder) before packing with compression
/// or unpacking compressed entries.
#[derive(Debug, Default)]
pub struct PackedStoreBuilder {
    encoder: Option<LzEncoder>,
    decoder: Option<LzDecoder>,
    chunk_index: ChunkIndex,
    checksum_policy: ChecksumPolicy,
}

impl PackedStoreBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.checksum_policy = policy;
        self
    }

    /// Set up the chunk encoder
    ///
    /// # Errors
    /// Returns [`Error::CompressionFailed`] if the codec rejects the parameters.
    pub fn init_lz_encoder(&mut self, max_helper_threads: i32, level: CompressionLevel) -> Result<()> {
        let encoder = LzEncoder::new(max_helper_threads, level)?;
        tracing::debug!(
            "Encoder ready: level '{}', {} helper threads",
            level,
            encoder.helper_threads()
        );
        self.encoder = Some(encoder);
        Ok(())
    }

    /// Set up the chunk decoder
    ///
    /// # Errors
    /// Returns [`Error::DecompressionFailed`] if the codec rejects the parameters.
    pub fn init_lz_decoder(&mut self) -> Result<()> {
        self.decoder = Some(LzDecoder::new()?);
        Ok(())
    }

    /// Point `descriptor` at an identical chunk already written to the pack
    /// file, if there is one.
    ///
    /// On a hit the descriptor takes over the existing chunk's offset and
    /// sizes and keeps its own flags; the caller must not write the chunk.
    pub fn deduplicate(
        &mut self,
        hash: &ChunkHash,
        descriptor: &mut VpkChunkDescriptor,
        chunk_index: usize,
    ) -> bool {
        let Some(existing) = self.chunk_index.find(hash) else {
            return false;
        };

        tracing::debug!(
            "Mapping chunk {chunk_index} ({}) to existing chunk at 0x{:x}",
            hash.to_hex(),
            existing.pack_file_offset
        );
        descriptor.pack_file_offset = existing.pack_file_offset;
        descriptor.compressed_size = existing.compressed_size;
        descriptor.uncompressed_size = existing.uncompressed_size;
        true
    }

    /// Pack a workspace into a store.
    ///
    /// Reads `<workspace>/manifest/<base name>.json`, drops entries that
    /// cannot be packed, and writes the pack and directory files into
    /// `build_path`. For client stores an `enable.txt` is created next to them.
    ///
    /// # Errors
    /// Returns [`Error::ManifestNotFound`] before any file is created if the
    /// manifest is missing. See [`pack_entries`](Self::pack_entries) for the rest.
    pub fn pack_store(&mut self, pair: &VpkPair, workspace: &Path, build_path: &Path) -> Result<PackReport> {
        self.pack_store_with_progress(pair, workspace, build_path, &|_| {})
    }

    /// Pack a workspace into a store with progress callback
    ///
    /// # Errors
    /// See [`pack_store`](Self::pack_store).
    pub fn pack_store_with_progress(
        &mut self,
        pair: &VpkPair,
        workspace: &Path,
        build_path: &Path,
        progress: ProgressCallback,
    ) -> Result<PackReport> {
        progress(&VpkProgress::new(VpkPhase::ReadingManifest, 0, 1));

        // The manifest is resolved before the pack file gets opened, so a bad
        // manifest never truncates an existing pack file.
        let manifest = Manifest::load(workspace, &pair.base_name())?;
        let ignore = IgnoreList::load(workspace);
        let entries = manifest.resolve(workspace, &ignore);
        tracing::info!(
            "Packing {} of {} manifest entries into '{}'",
            entries.len(),
            manifest.len(),
            pair.dir_name
        );

        let report = self.pack_entries_with_progress(pair, &entries, build_path, progress)?;

        if pair.target == "client" {
            let enable_path = build_path.join(ENABLE_FILE);
            if !enable_path.exists() {
                fs::write(&enable_path, ENABLE_FILE_CONTENTS)?;
            }
        }

        Ok(report)
    }

    /// Pack already resolved entries into a store
    ///
    /// # Errors
    /// Returns [`Error::CodecNotInitialized`] if an entry asks for compression
    /// and no encoder was set up, [`Error::DuplicateEntry`] if two entries share
    /// a path, or [`Error::Io`] if the pack or directory file cannot be written.
    /// Source files that cannot be read are skipped with a warning.
    pub fn pack_entries(
        &mut self,
        pair: &VpkPair,
        entries: &[ResolvedEntry],
        build_path: &Path,
    ) -> Result<PackReport> {
        self.pack_entries_with_progress(pair, entries, build_path, &|_| {})
    }

    /// Pack already resolved entries into a store with progress callback
    ///
    /// # Errors
    /// See [`pack_entries`](Self::pack_entries).
    pub fn pack_entries_with_progress(
        &mut self,
        pair: &VpkPair,
        entries: &[ResolvedEntry],
        build_path: &Path,
        progress: ProgressCallback,
    ) -> Result<PackReport> {
        if self.encoder.is_none() && entries.iter().any(|e| e.settings.use_compression) {
            return Err(Error::CodecNotInitialized("encoder"));
        }

        // Every tree slot is checked before the pack file gets truncated
        let mut slots = HashSet::with_capacity(entries.len());
        if let Some(duplicate) = entries
            .iter()
            .find(|e| !slots.insert(split_entry_path(&e.entry_path)))
        {
            return Err(Error::DuplicateEntry(duplicate.entry_path.clone()));
        }

        fs::create_dir_all(build_path)?;
        let pack_file_path = build_path.join(&pair.pack_name);
        let dir_file_path = build_path.join(&pair.dir_name);

        let mut pack_file = BufWriter::new(File::create(&pack_file_path)?);
        let mut cursor: u64 = 0;
        let mut entry_blocks = Vec::with_capacity(entries.len());
        let total = entries.len();

        for (i, entry) in entries.iter().enumerate() {
            progress(&VpkProgress::with_file(
                VpkPhase::PackingEntries,
                i + 1,
                total,
                &entry.entry_path,
            ));

            let settings = &entry.settings;
            let (mut block, data) = match VpkEntryBlock::from_source_file(
                &entry.source,
                cursor,
                settings.preload_size,
                pair.patch,
                settings.load_flags,
                settings.texture_flags,
                entry.entry_path.clone(),
            ) {
                Ok(read) => read,
                Err(e) => {
                    tracing::error!("Unable to read '{}': {e}", entry.source.display());
                    continue;
                }
            };

            tracing::debug!("Packing entry {i} ('{}')", entry.entry_path);

            for (j, (chunk, descriptor)) in data
                .chunks(ENTRY_MAX_LEN)
                .zip(block.fragments.iter_mut())
                .enumerate()
            {
                descriptor.pack_file_offset = cursor;

                let hash = settings.deduplicate.then(|| ChunkIndex::hash(chunk));
                if let Some(hash) = &hash {
                    if self.deduplicate(hash, descriptor, j) {
                        continue;
                    }
                }

                let stored = if settings.use_compression {
                    self.compress_chunk(chunk, &entry.entry_path, j)
                } else {
                    Cow::Borrowed(chunk)
                };

                descriptor.compressed_size = stored.len() as u64;
                pack_file.write_all(&stored)?;
                cursor += stored.len() as u64;

                if let Some(hash) = hash {
                    self.chunk_index.insert(hash, *descriptor);
                }
            }

            entry_blocks.push(block);
        }

        pack_file.flush()?;
        drop(pack_file);

        let shared_chunks = self.chunk_index.shared_chunks();
        let shared_bytes = self.chunk_index.shared_bytes();
        tracing::info!(
            "Built pack file '{}' totaling {} bytes in {} hashed chunks, with {} shared bytes among {} chunks",
            pack_file_path.display(),
            cursor,
            self.chunk_index.unique_chunks(),
            shared_bytes,
            shared_chunks
        );
        self.chunk_index.clear();

        progress(&VpkProgress::new(VpkPhase::WritingDirectory, 0, 1));
        let mut directory = VpkDir::default();
        let descriptors = directory.build_directory_file(&dir_file_path, &entry_blocks)?;
        let dir_file_size = fs::metadata(&dir_file_path)?.len();

        progress(&VpkProgress::new(VpkPhase::Complete, total, total));

        Ok(PackReport {
            pack_file_path,
            dir_file_path,
            entry_blocks,
            descriptors,
            shared_chunks,
            shared_bytes,
            pack_file_size: cursor,
            dir_file_size,
        })
    }

    /// Compress a chunk, keeping the result only if it is strictly smaller
    fn compress_chunk<'c>(&mut self, chunk: &'c [u8], entry_path: &str, chunk_index: usize) -> Cow<'c, [u8]> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Cow::Borrowed(chunk);
        };

        match encoder.compress(chunk) {
            Ok(compressed) if compressed.len() < chunk.len() => Cow::Owned(compressed),
            Ok(_) => Cow::Borrowed(chunk),
            Err(e) => {
                tracing::warn!(
                    "{e} for chunk {chunk_index} of '{entry_path}' (chunk packed without compression)"
                );
                Cow::Borrowed(chunk)
            }
        }
    }

    /// Restore every entry of a loaded store into `output_dir`.
    ///
    /// A build manifest describing the entries is written to
    /// `<output_dir>/manifest/<base name>.json` first, so the output can be
    /// packed again.
    ///
    /// # Errors
    /// Returns [`Error::DirectoryTreeFailed`] if the directory file failed to
    /// load, [`Error::CodecNotInitialized`] if compressed entries exist and no
    /// decoder was set up, [`Error::Io`] if a pack file is missing, and
    /// [`Error::ChecksumMismatch`] under [`ChecksumPolicy::Abort`]. Other
    /// per-entry problems are recorded in the report.
    pub fn unpack_store(&mut self, dir: &VpkDir, output_dir: &Path) -> Result<UnpackReport> {
        self.unpack_store_with_progress(dir, output_dir, &|_| {})
    }

    /// Restore every entry of a loaded store with progress callback
    ///
    /// # Errors
    /// See [`unpack_store`](Self::unpack_store).
    pub fn unpack_store_with_progress(
        &mut self,
        dir: &VpkDir,
        output_dir: &Path,
        progress: ProgressCallback,
    ) -> Result<UnpackReport> {
        if let Some(reason) = dir.failure_reason() {
            return Err(Error::DirectoryTreeFailed {
                path: dir.dir_file_path.clone(),
                reason: reason.to_string(),
            });
        }

        let has_compressed = dir
            .entry_blocks
            .iter()
            .flat_map(|b| &b.fragments)
            .any(VpkChunkDescriptor::is_compressed);
        if has_compressed && self.decoder.is_none() {
            return Err(Error::CodecNotInitialized("decoder"));
        }

        fs::create_dir_all(output_dir)?;

        let mut report = UnpackReport {
            manifest_path: Some(
                Manifest::from_entry_blocks(&dir.entry_blocks).save(output_dir, &dir.base_name())?,
            ),
            ..UnpackReport::default()
        };

        let total = dir.entry_blocks.len();
        let mut current = 0;

        for &pack_file_index in &dir.pak_file_indices {
            let pack_file_path = dir.pack_file_path_for_index(pack_file_index);
            let mut pack_file = match File::open(&pack_file_path) {
                Ok(file) => BufReader::new(file),
                Err(e) => {
                    tracing::error!("Unable to open '{}': {e}", pack_file_path.display());
                    return Err(e.into());
                }
            };

            for (j, block) in dir
                .entry_blocks
                .iter()
                .enumerate()
                .filter(|(_, b)| b.pack_file_index == pack_file_index)
            {
                current += 1;
                progress(&VpkProgress::with_file(
                    VpkPhase::UnpackingEntries,
                    current,
                    total,
                    &block.entry_path,
                ));
                tracing::debug!(
                    "Unpacking entry {j} from pack {pack_file_index} ('{}')",
                    block.entry_path
                );

                match self.unpack_entry(&mut pack_file, block, output_dir) {
                    Ok(written) => {
                        report.bytes_written += written;
                        report.restored.push(block.entry_path.clone());
                    }
                    Err(e @ Error::ChecksumMismatch { .. })
                        if self.checksum_policy == ChecksumPolicy::Abort =>
                    {
                        tracing::error!("{e}");
                        return Err(e);
                    }
                    Err(e) => {
                        tracing::warn!("Skipping '{}': {e}", block.entry_path);
                        report.failures.push((block.entry_path.clone(), e.to_string()));
                    }
                }
            }
        }

        progress(&VpkProgress::new(VpkPhase::Complete, total, total));
        tracing::info!(
            "Unpacked {} of {} entries ({} bytes) into '{}'",
            report.restored.len(),
            total,
            report.bytes_written,
            output_dir.display()
        );

        Ok(report)
    }

    /// Reassemble, verify and write one entry. Returns the bytes written.
    fn unpack_entry<R: Read + Seek>(
        &mut self,
        pack_file: &mut R,
        block: &VpkEntryBlock,
        output_dir: &Path,
    ) -> Result<u64> {
        let output_path = entry_output_path(output_dir, &block.entry_path)?;
        let mut data = Vec::new();

        for (k, fragment) in block.fragments.iter().enumerate() {
            fragment.validate(&block.entry_path, k)?;

            pack_file.seek(SeekFrom::Start(fragment.pack_file_offset))?;
            let mut stored = vec![0u8; fragment.compressed_size as usize];
            pack_file.read_exact(&mut stored)?;

            if !fragment.is_compressed() {
                data.extend_from_slice(&stored);
                continue;
            }

            let expected = fragment.uncompressed_size as usize;
            let decoder = self
                .decoder
                .as_mut()
                .ok_or(Error::CodecNotInitialized("decoder"))?;
            let decoded = decoder
                .decompress(&stored, expected)
                .map_err(|message| Error::DecompressionFailed {
                    entry: block.entry_path.clone(),
                    chunk: k,
                    message,
                })?;

            if decoded.len() != expected {
                return Err(Error::DecompressionFailed {
                    entry: block.entry_path.clone(),
                    chunk: k,
                    message: format!("decoded {} bytes, expected {expected}", decoded.len()),
                });
            }
            data.extend_from_slice(&decoded);
        }

        let computed = crc32fast::hash(&data);
        if computed != block.file_crc {
            return Err(Error::ChecksumMismatch {
                entry: block.entry_path.clone(),
                expected: block.file_crc,
                computed,
            });
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&output_path, &data)?;

        Ok(data.len() as u64)
    }
}
