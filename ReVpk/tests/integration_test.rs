use pretty_assertions::assert_eq;
use revpk::prelude::*;
use revpk::vpk::ENTRY_MAX_LEN;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

const MIB: usize = 1024 * 1024;

/// Compressible bytes that differ from one 1 MiB chunk to the next
fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn write_file(root: &Path, entry_path: &str, contents: &[u8]) {
    let path = root.join(entry_path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Workspace with a manifest listing every given file
fn workspace(files: &[(&str, Vec<u8>)], pair: &VpkPair, settings: ManifestEntry) -> TempDir {
    let temp = tempdir().unwrap();
    let mut manifest = Manifest::new();
    for (entry_path, contents) in files {
        write_file(temp.path(), entry_path, contents);
        manifest.insert(*entry_path, settings);
    }
    manifest.save(temp.path(), &pair.base_name()).unwrap();
    temp
}

fn uncompressed() -> ManifestEntry {
    ManifestEntry {
        use_compression: false,
        ..ManifestEntry::default()
    }
}

fn pack(pair: &VpkPair, workspace: &Path, build: &Path) -> PackReport {
    let mut builder = PackedStoreBuilder::new();
    builder.init_lz_encoder(0, CompressionLevel::Fastest).unwrap();
    builder.pack_store(pair, workspace, build).unwrap()
}

fn unpack(dir: &VpkDir, output: &Path, policy: ChecksumPolicy) -> revpk::Result<UnpackReport> {
    let mut builder = PackedStoreBuilder::new().with_checksum_policy(policy);
    builder.init_lz_decoder().unwrap();
    builder.unpack_store(dir, output)
}

#[test]
fn test_round_trip_compressed() {
    let pair = VpkPair::new("english", "client", "mp_test", 0);
    let files = vec![
        ("scripts/vscripts/weapons.nut", b"function Weapons() {}\n".repeat(200)),
        ("materials/big.vtf", patterned(2 * MIB + MIB / 2)),
        ("empty.txt", Vec::new()),
        ("readme", b"no extension".to_vec()),
    ];
    let ws = workspace(&files, &pair, ManifestEntry::default());
    let build = tempdir().unwrap();

    let report = pack(&pair, ws.path(), build.path());
    assert_eq!(report.entry_count(), 4);
    assert!(build.path().join(&pair.dir_name).is_file());
    assert!(build.path().join(&pair.pack_name).is_file());
    assert_eq!(fs::read_to_string(build.path().join("enable.txt")).unwrap(), "1 \r\n");

    let dir = VpkDir::open(build.path().join(&pair.dir_name));
    assert!(!dir.failed());
    assert_eq!(dir.entry_blocks.len(), 4);

    let big = dir
        .entry_blocks
        .iter()
        .find(|b| b.entry_path == "materials/big.vtf")
        .unwrap();
    let sizes: Vec<u64> = big.fragments.iter().map(|f| f.uncompressed_size).collect();
    assert_eq!(sizes, vec![MIB as u64, MIB as u64, (MIB / 2) as u64]);
    assert!(big.fragments.iter().all(|f| f.compressed_size < f.uncompressed_size));

    let empty = dir.entry_blocks.iter().find(|b| b.entry_path == "empty.txt").unwrap();
    assert!(empty.fragments.is_empty());
    assert_eq!(empty.file_crc, crc32fast::hash(&[]));

    let out = tempdir().unwrap();
    let unpacked = unpack(&dir, out.path(), ChecksumPolicy::Abort).unwrap();
    assert!(unpacked.is_complete());
    assert_eq!(unpacked.restored.len(), 4);

    for (entry_path, contents) in &files {
        assert_eq!(&fs::read(out.path().join(entry_path)).unwrap(), contents, "{entry_path}");
    }

    // The rebuilt manifest packs the unpacked workspace again
    let rebuilt = Manifest::load(out.path(), &pair.base_name()).unwrap();
    assert_eq!(rebuilt.len(), 4);
    assert!(rebuilt.entries["materials/big.vtf"].use_compression);
}

#[test]
fn test_round_trip_uncompressed() {
    let pair = VpkPair::new("english", "server", "mp_raw", 3);
    let files = vec![
        ("a/one.bin", patterned(ENTRY_MAX_LEN + 10)),
        ("b/two.txt", b"two".to_vec()),
    ];
    let ws = workspace(&files, &pair, uncompressed());
    let build = tempdir().unwrap();

    let report = pack(&pair, ws.path(), build.path());
    assert_eq!(report.pack_file_size, (ENTRY_MAX_LEN + 13) as u64);
    assert!(report.pack_file_path.ends_with("server_mp_raw.bsp.pak000_003.vpk"));
    assert!(!build.path().join("enable.txt").exists());

    let dir = VpkDir::open(&report.dir_file_path);
    assert_eq!(dir.pak_file_indices.iter().copied().collect::<Vec<_>>(), vec![3]);
    for block in &dir.entry_blocks {
        assert!(block.fragments.iter().all(|f| !f.is_compressed()));
    }

    let out = tempdir().unwrap();
    let unpacked = unpack(&dir, out.path(), ChecksumPolicy::Continue).unwrap();
    assert!(unpacked.is_complete());
    for (entry_path, contents) in &files {
        assert_eq!(&fs::read(out.path().join(entry_path)).unwrap(), contents);
    }
    assert!(!Manifest::load(out.path(), &pair.base_name()).unwrap().entries["b/two.txt"].use_compression);
}

#[test]
fn test_identical_files_share_chunks() {
    let pair = VpkPair::new("english", "server", "mp_dedup", 0);
    let shared = b"identical content".repeat(64);
    let files = vec![("a/x.bin", shared.clone()), ("b/y.bin", shared.clone())];
    let ws = workspace(&files, &pair, uncompressed());
    let build = tempdir().unwrap();

    let report = pack(&pair, ws.path(), build.path());
    assert_eq!(report.pack_file_size, shared.len() as u64);
    assert_eq!(report.shared_chunks, 1);
    assert_eq!(report.shared_bytes, shared.len() as u64);

    let dir = VpkDir::open(&report.dir_file_path);
    let offsets: Vec<u64> = dir
        .entry_blocks
        .iter()
        .map(|b| b.fragments[0].pack_file_offset)
        .collect();
    assert_eq!(offsets, vec![0, 0]);

    let out = tempdir().unwrap();
    assert!(unpack(&dir, out.path(), ChecksumPolicy::Abort).unwrap().is_complete());
    assert_eq!(fs::read(out.path().join("b/y.bin")).unwrap(), shared);
}

#[test]
fn test_identical_compressed_files_share_chunks() {
    let pair = VpkPair::new("english", "server", "mp_dedup_lz", 0);
    let shared = b"identical content".repeat(64);
    let files = vec![("a/x.bin", shared.clone()), ("b/y.bin", shared.clone())];
    let ws = workspace(&files, &pair, ManifestEntry::default());
    let build = tempdir().unwrap();

    let report = pack(&pair, ws.path(), build.path());
    assert_eq!(report.shared_chunks, 1);

    let dir = VpkDir::open(&report.dir_file_path);
    let ranges: Vec<(u64, u64)> = dir
        .entry_blocks
        .iter()
        .map(|b| (b.fragments[0].pack_file_offset, b.fragments[0].compressed_size))
        .collect();
    assert_eq!(ranges[0], ranges[1]);
    assert_eq!(ranges[0].0, 0);
    assert_eq!(report.pack_file_size, ranges[0].1);
    assert!(ranges[0].1 < shared.len() as u64);
    assert!(dir.entry_blocks.iter().all(|b| b.fragments[0].is_compressed()));

    let out = tempdir().unwrap();
    assert!(unpack(&dir, out.path(), ChecksumPolicy::Abort).unwrap().is_complete());
    for (entry_path, contents) in &files {
        assert_eq!(&fs::read(out.path().join(entry_path)).unwrap(), contents);
    }
}

#[test]
fn test_dedup_across_compression_settings() {
    let pair = VpkPair::new("english", "server", "mp_dedup_mixed", 0);
    let raw_first = b"stored raw first ".repeat(64);
    let packed_first = b"stored compressed first ".repeat(64);

    let ws = tempdir().unwrap();
    let mut manifest = Manifest::new();
    let compressed = ManifestEntry::default();
    for (entry_path, contents, settings) in [
        ("raw/a.bin", &raw_first, uncompressed()),
        ("lz/a.bin", &raw_first, compressed),
        ("lz/b.bin", &packed_first, compressed),
        ("raw/b.bin", &packed_first, uncompressed()),
    ] {
        write_file(ws.path(), entry_path, contents);
        manifest.insert(entry_path, settings);
    }
    manifest.save(ws.path(), &pair.base_name()).unwrap();
    let build = tempdir().unwrap();

    let report = pack(&pair, ws.path(), build.path());
    assert_eq!(report.shared_chunks, 2);

    let dir = VpkDir::open(&report.dir_file_path);
    let fragment = |path: &str| {
        dir.entry_blocks
            .iter()
            .find(|b| b.entry_path == path)
            .unwrap()
            .fragments[0]
    };

    // A compressing entry reuses the raw chunk as is
    let (raw_a, lz_a) = (fragment("raw/a.bin"), fragment("lz/a.bin"));
    assert!(!raw_a.is_compressed());
    assert_eq!(
        (lz_a.pack_file_offset, lz_a.compressed_size, lz_a.uncompressed_size),
        (raw_a.pack_file_offset, raw_a.compressed_size, raw_a.uncompressed_size)
    );

    // A raw entry reuses the compressed chunk as is
    let (lz_b, raw_b) = (fragment("lz/b.bin"), fragment("raw/b.bin"));
    assert!(lz_b.is_compressed());
    assert_eq!(
        (raw_b.pack_file_offset, raw_b.compressed_size),
        (lz_b.pack_file_offset, lz_b.compressed_size)
    );
    assert_eq!(report.pack_file_size, raw_first.len() as u64 + lz_b.compressed_size);

    let out = tempdir().unwrap();
    assert!(unpack(&dir, out.path(), ChecksumPolicy::Abort).unwrap().is_complete());
    assert_eq!(fs::read(out.path().join("lz/a.bin")).unwrap(), raw_first);
    assert_eq!(fs::read(out.path().join("raw/b.bin")).unwrap(), packed_first);
}

#[test]
fn test_dedup_disabled_writes_every_copy() {
    let pair = VpkPair::new("english", "server", "mp_nodedup", 0);
    let shared = vec![7u8; 100];
    let settings = ManifestEntry {
        deduplicate: false,
        ..uncompressed()
    };
    let ws = workspace(&[("x.bin", shared.clone()), ("y.bin", shared)], &pair, settings);
    let build = tempdir().unwrap();

    let report = pack(&pair, ws.path(), build.path());
    assert_eq!(report.pack_file_size, 200);
    assert_eq!(report.shared_chunks, 0);
}

#[test]
fn test_ignored_entries_are_not_packed() {
    let pair = VpkPair::new("english", "server", "mp_ignore", 0);
    let files = vec![("keep.txt", b"keep".to_vec()), ("old/drop.bak", b"drop".to_vec())];
    let ws = workspace(&files, &pair, uncompressed());
    fs::write(ws.path().join(".vpkignore"), "// build junk\r\n*.bak\r\n").unwrap();
    let build = tempdir().unwrap();

    let report = pack(&pair, ws.path(), build.path());
    let paths: Vec<&str> = report.entry_blocks.iter().map(|b| b.entry_path.as_str()).collect();
    assert_eq!(paths, vec!["keep.txt"]);
}

#[test]
fn test_missing_manifest_leaves_pack_file_alone() {
    let pair = VpkPair::new("english", "server", "mp_nomanifest", 0);
    let ws = tempdir().unwrap();
    let build = tempdir().unwrap();
    let pack_path = build.path().join(&pair.pack_name);
    fs::write(&pack_path, b"previous build").unwrap();

    let mut builder = PackedStoreBuilder::new();
    builder.init_lz_encoder(0, CompressionLevel::Default).unwrap();
    let result = builder.pack_store(&pair, ws.path(), build.path());

    assert!(matches!(result, Err(Error::ManifestNotFound(_))));
    assert_eq!(fs::read(&pack_path).unwrap(), b"previous build");
}

#[test]
fn test_duplicate_spellings_pack_once() {
    let pair = VpkPair::new("english", "server", "mp_spellings", 0);
    let ws = tempdir().unwrap();
    write_file(ws.path(), "a/b.txt", b"hello");

    let mut manifest = Manifest::new();
    manifest.insert("a/b.txt", uncompressed());
    manifest.insert("a\\b.txt", uncompressed());
    manifest.save(ws.path(), &pair.base_name()).unwrap();

    let build = tempdir().unwrap();
    fs::write(build.path().join(&pair.pack_name), b"previous build").unwrap();

    let report = pack(&pair, ws.path(), build.path());
    assert_eq!(report.entry_count(), 1);
    assert_eq!(fs::read(&report.pack_file_path).unwrap(), b"hello");

    let dir = VpkDir::open(&report.dir_file_path);
    assert!(!dir.failed());
    assert_eq!(dir.entry_blocks.len(), 1);
    assert_eq!(dir.entry_blocks[0].entry_path, "a/b.txt");
}

#[test]
fn test_corrupt_header_refuses_unpack() {
    let pair = VpkPair::new("english", "server", "mp_header", 0);
    let ws = workspace(&[("a.txt", b"a".to_vec())], &pair, uncompressed());
    let build = tempdir().unwrap();
    let report = pack(&pair, ws.path(), build.path());

    let mut bytes = fs::read(&report.dir_file_path).unwrap();
    bytes[4] = 1; // major version
    fs::write(&report.dir_file_path, &bytes).unwrap();

    let dir = VpkDir::open(&report.dir_file_path);
    assert!(dir.failed());

    let out = tempdir().unwrap();
    let target = out.path().join("restored");
    let result = unpack(&dir, &target, ChecksumPolicy::Continue);
    assert!(matches!(result, Err(Error::DirectoryTreeFailed { .. })));
    assert!(!target.exists());
}

#[test]
fn test_checksum_mismatch_policies() {
    let pair = VpkPair::new("english", "server", "mp_crc", 0);
    let files = vec![("bad.txt", b"hello world".to_vec()), ("good.txt", b"fine".to_vec())];
    let ws = workspace(&files, &pair, uncompressed());
    let build = tempdir().unwrap();
    let report = pack(&pair, ws.path(), build.path());

    // bad.txt is the first entry written, at offset 0
    let mut pack_bytes = fs::read(&report.pack_file_path).unwrap();
    pack_bytes[0] ^= 0xFF;
    fs::write(&report.pack_file_path, &pack_bytes).unwrap();

    let dir = VpkDir::open(&report.dir_file_path);

    let out = tempdir().unwrap();
    let lenient = unpack(&dir, out.path(), ChecksumPolicy::Continue).unwrap();
    assert!(!lenient.is_complete());
    assert_eq!(lenient.failures.len(), 1);
    assert_eq!(lenient.total_entries(), 2);
    assert_eq!(lenient.failures[0].0, "bad.txt");
    assert_eq!(lenient.restored, vec!["good.txt".to_string()]);
    assert!(!out.path().join("bad.txt").exists());

    let strict_out = tempdir().unwrap();
    let strict = unpack(&dir, strict_out.path(), ChecksumPolicy::Abort);
    assert!(matches!(strict, Err(Error::ChecksumMismatch { .. })));
}

#[test]
fn test_missing_pack_file_is_fatal() {
    let pair = VpkPair::new("english", "server", "mp_nopack", 0);
    let ws = workspace(&[("a.txt", b"a".to_vec())], &pair, uncompressed());
    let build = tempdir().unwrap();
    let report = pack(&pair, ws.path(), build.path());
    fs::remove_file(&report.pack_file_path).unwrap();

    let dir = VpkDir::open(&report.dir_file_path);
    let out = tempdir().unwrap();
    assert!(matches!(
        unpack(&dir, out.path(), ChecksumPolicy::Continue),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_sanitized_open_from_pack_file() {
    let pair = VpkPair::new("german", "client", "mp_locale", 0);
    let ws = workspace(&[("a.txt", b"a".to_vec())], &pair, uncompressed());
    let build = tempdir().unwrap();
    let report = pack(&pair, ws.path(), build.path());

    let dir = VpkDir::open_sanitized(&report.pack_file_path, true);
    assert!(!dir.failed());
    assert_eq!(dir.dir_file_path, report.dir_file_path);
    assert_eq!(dir.pack_file_path_for_index(0), report.pack_file_path);
}
