//! CLI command for packing a workspace

use std::path::Path;
use std::time::Instant;

use crate::cli::progress::{DISK, LOOKING_GLASS, PACKAGE, entry_bar, format_size, print_done, print_step, update_bar};
use crate::vpk::{CompressionLevel, PackedStoreBuilder, VpkPair};

/// Arguments of the `pack` command
pub struct PackArgs<'a> {
    pub locale: &'a str,
    pub context: &'a str,
    pub level: &'a str,
    pub workspace: &'a Path,
    pub build_path: &'a Path,
    pub threads: i32,
    pub compression: &'a str,
    pub patch: u16,
    pub quiet: bool,
}

pub fn execute(args: &PackArgs) -> anyhow::Result<()> {
    let started = Instant::now();

    let pair = VpkPair::new(args.locale, args.context, args.level, args.patch);
    let level = CompressionLevel::parse_lossy(args.compression);

    print_step(1, 3, LOOKING_GLASS, &format!("Reading manifest for {}...", pair.dir_name));

    let mut builder = PackedStoreBuilder::new();
    builder.init_lz_encoder(args.threads, level)?;

    print_step(2, 3, PACKAGE, &format!("Packing {}...", pair.pack_name));
    let pb = entry_bar("Packing", args.quiet);
    let report = builder.pack_store_with_progress(&pair, args.workspace, args.build_path, &|progress| {
        update_bar(&pb, progress);
    })?;
    pb.finish_and_clear();

    print_step(3, 3, DISK, &format!("Wrote {}", report.dir_file_path.display()));
    println!(
        "  {} entries, {} descriptors",
        report.entry_count(),
        report.descriptors
    );
    println!(
        "  pack file {} ({} shared among {} chunks), directory {}",
        format_size(report.pack_file_size),
        format_size(report.shared_bytes),
        report.shared_chunks,
        format_size(report.dir_file_size)
    );

    print_done(started.elapsed());
    Ok(())
}
