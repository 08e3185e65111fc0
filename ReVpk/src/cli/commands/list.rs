//! CLI command for listing VPK contents

use std::path::Path;

use console::style;

use crate::cli::progress::format_size;
use crate::vpk::VpkDir;

pub fn execute(file: &Path, detailed: bool, sanitize: bool) -> anyhow::Result<()> {
    let dir = VpkDir::open_sanitized(file, sanitize);
    if let Some(reason) = dir.failure_reason() {
        anyhow::bail!("Unable to load '{}': {reason}", dir.dir_file_path.display());
    }

    println!(
        "{} (version {}.{}, tree {} bytes)",
        style(dir.dir_file_path.display()).bold(),
        dir.header.major_version,
        dir.header.minor_version,
        dir.header.directory_size
    );

    let mut total_size = 0;
    let mut total_stored = 0;

    for block in &dir.entry_blocks {
        let size = block.uncompressed_size();
        total_size += size;
        total_stored += block.compressed_size();

        if detailed {
            println!(
                "{:>10} {:>10} {:>4} {:>3}  {:08X}  {}",
                format_size(size),
                format_size(block.compressed_size()),
                block.fragments.len(),
                block.pack_file_index,
                block.file_crc,
                block.entry_path
            );
        } else {
            println!("{}", block.entry_path);
        }
    }

    println!(
        "{} entries, {} ({} stored) across {} pack file(s)",
        dir.entry_blocks.len(),
        format_size(total_size),
        format_size(total_stored),
        dir.pak_file_indices.len()
    );

    Ok(())
}
