//! CLI command for unpacking a VPK

use std::path::Path;
use std::time::Instant;

use console::style;

use crate::cli::progress::{DISK, LOOKING_GLASS, PACKAGE, entry_bar, format_size, print_done, print_step, update_bar};
use crate::vpk::{ChecksumPolicy, PackedStoreBuilder, VpkDir};

pub fn execute(
    file: &Path,
    output: &Path,
    sanitize: bool,
    strict_crc: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();

    print_step(1, 3, LOOKING_GLASS, &format!("Reading {}...", file.display()));
    let dir = VpkDir::open_sanitized(file, sanitize);
    if let Some(reason) = dir.failure_reason() {
        anyhow::bail!("Unable to load '{}': {reason}", dir.dir_file_path.display());
    }

    let policy = if strict_crc {
        ChecksumPolicy::Abort
    } else {
        ChecksumPolicy::Continue
    };
    let mut builder = PackedStoreBuilder::new().with_checksum_policy(policy);
    builder.init_lz_decoder()?;

    print_step(
        2,
        3,
        PACKAGE,
        &format!(
            "Unpacking {} entries from {} pack file(s)...",
            dir.entry_blocks.len(),
            dir.pak_file_indices.len()
        ),
    );
    let pb = entry_bar("Unpacking", quiet);
    let report = builder.unpack_store_with_progress(&dir, output, &|progress| {
        update_bar(&pb, progress);
    })?;
    pb.finish_and_clear();

    print_step(
        3,
        3,
        DISK,
        &format!(
            "Restored {} of {} entries ({}) into {}",
            report.restored.len(),
            report.total_entries(),
            format_size(report.bytes_written),
            output.display()
        ),
    );
    if let Some(manifest_path) = &report.manifest_path {
        println!("  manifest: {}", manifest_path.display());
    }

    if !report.is_complete() {
        println!(
            "{}",
            style(format!("{} entries failed:", report.failures.len())).red().bold()
        );
        for (entry, message) in &report.failures {
            println!("  {entry}: {message}");
        }
        anyhow::bail!(
            "{} of {} entries could not be restored",
            report.failures.len(),
            report.total_entries()
        );
    }

    print_done(started.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vpk::{CompressionLevel, Manifest, ManifestEntry, VpkPair};
    use std::fs;
    use tempfile::TempDir;

    fn pack_one(temp: &TempDir) -> std::path::PathBuf {
        let workspace = temp.path().join("ship");
        fs::create_dir_all(&workspace).unwrap();
        fs::write(workspace.join("a.txt"), b"hello world").unwrap();

        let pair = VpkPair::new("english", "server", "mp_cli", 0);
        let mut manifest = Manifest::new();
        manifest.insert(
            "a.txt",
            ManifestEntry {
                use_compression: false,
                ..ManifestEntry::default()
            },
        );
        manifest.save(&workspace, &pair.base_name()).unwrap();

        let mut builder = PackedStoreBuilder::new();
        builder.init_lz_encoder(0, CompressionLevel::Fastest).unwrap();
        let report = builder
            .pack_store(&pair, &workspace, &temp.path().join("vpk"))
            .unwrap();
        report.pack_file_path
    }

    #[test]
    fn test_clean_unpack_succeeds() {
        let temp = TempDir::new().unwrap();
        let pack_file = pack_one(&temp);

        let output = temp.path().join("out");
        execute(&pack_file, &output, true, false, true).unwrap();
        assert_eq!(fs::read(output.join("a.txt")).unwrap(), b"hello world");
    }

    #[test]
    fn test_checksum_failures_fail_the_command() {
        let temp = TempDir::new().unwrap();
        let pack_file = pack_one(&temp);

        let mut bytes = fs::read(&pack_file).unwrap();
        bytes[0] ^= 0xFF;
        fs::write(&pack_file, &bytes).unwrap();

        let output = temp.path().join("out");
        let err = execute(&pack_file, &output, true, false, true).unwrap_err();
        assert!(err.to_string().contains("1 of 1 entries"));
        assert!(!output.join("a.txt").exists());
    }
}
