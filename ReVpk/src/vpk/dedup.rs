//! Chunk deduplication
//!
//! Every chunk written to a pack file is indexed by a hash of its
//! uncompressed bytes. A later chunk with the same bytes points at the first
//! copy instead of being compressed and written again.

use std::collections::HashMap;

use super::VpkChunkDescriptor;

/// Content hash of an uncompressed chunk
pub type ChunkHash = blake3::Hash;

/// Index of the chunks written to the current pack file
#[derive(Debug, Default)]
pub struct ChunkIndex {
    descriptors: Vec<VpkChunkDescriptor>,
    by_hash: HashMap<ChunkHash, usize>,
    shared_chunks: usize,
    shared_bytes: u64,
}

impl ChunkIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn hash(chunk: &[u8]) -> ChunkHash {
        blake3::hash(chunk)
    }

    /// Descriptor of the first chunk written with this hash, counting the hit
    pub fn find(&mut self, hash: &ChunkHash) -> Option<VpkChunkDescriptor> {
        let existing = self.descriptors[*self.by_hash.get(hash)?];
        self.shared_chunks += 1;
        self.shared_bytes += existing.compressed_size;
        Some(existing)
    }

    /// Record where the chunk with this hash was written. The first location
    /// recorded for a hash wins.
    pub fn insert(&mut self, hash: ChunkHash, descriptor: VpkChunkDescriptor) {
        if self.by_hash.contains_key(&hash) {
            return;
        }
        self.by_hash.insert(hash, self.descriptors.len());
        self.descriptors.push(descriptor);
    }

    /// Number of distinct chunks written
    #[must_use]
    pub fn unique_chunks(&self) -> usize {
        self.descriptors.len()
    }

    /// Number of lookups that hit an existing chunk
    #[must_use]
    pub fn shared_chunks(&self) -> usize {
        self.shared_chunks
    }

    /// Pack file bytes saved by shared chunks
    #[must_use]
    pub fn shared_bytes(&self) -> u64 {
        self.shared_bytes
    }

    /// Forget every chunk, e.g. once a pack file is finished
    pub fn clear(&mut self) {
        self.descriptors.clear();
        self.by_hash.clear();
        self.shared_chunks = 0;
        self.shared_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_chunks_share_descriptor() {
        let mut index = ChunkIndex::new();
        let first = VpkChunkDescriptor::new(1, 8, 0, 3, 4);
        let hash = ChunkIndex::hash(b"abcd");

        assert_eq!(index.find(&hash), None);
        index.insert(hash, first);
        assert_eq!(index.find(&ChunkIndex::hash(b"abcd")), Some(first));
        assert_eq!(index.find(&ChunkIndex::hash(b"abce")), None);

        assert_eq!(index.unique_chunks(), 1);
        assert_eq!(index.shared_chunks(), 1);
        assert_eq!(index.shared_bytes(), 3);
    }

    #[test]
    fn test_first_location_wins() {
        let mut index = ChunkIndex::new();
        let hash = ChunkIndex::hash(b"x");
        index.insert(hash, VpkChunkDescriptor::new(0, 0, 0, 1, 1));
        index.insert(hash, VpkChunkDescriptor::new(0, 0, 9, 1, 1));

        assert_eq!(index.unique_chunks(), 1);
        assert_eq!(index.find(&hash).unwrap().pack_file_offset, 0);
    }

    #[test]
    fn test_clear() {
        let mut index = ChunkIndex::new();
        let hash = ChunkIndex::hash(b"x");
        index.insert(hash, VpkChunkDescriptor::new(0, 0, 0, 1, 1));
        index.clear();

        assert_eq!(index.unique_chunks(), 0);
        assert_eq!(index.find(&hash), None);
        assert_eq!(index.shared_chunks(), 0);
    }
}
