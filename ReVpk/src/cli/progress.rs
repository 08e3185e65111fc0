//! CLI progress display utilities
//!
//! Step indicators with emojis plus a progress bar fed by the library's
//! progress callbacks.

use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

use crate::vpk::{VpkPhase, VpkProgress};

/// Magnifying glass - for reading/scanning operations
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
/// Package - for packing/unpacking operations
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");
/// Floppy disk - for writing/saving operations
pub static DISK: Emoji<'_, '_> = Emoji("💾 ", "");
/// Sparkles - for completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

/// Print a step indicator: `[1/3] 📦 Message...`
pub fn print_step(current: usize, total: usize, emoji: Emoji, msg: &str) {
    println!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    println!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

/// Progress bar style for determinate progress
///
/// Format: `Packing [████████░░░░░░░░] 50/100`
#[must_use]
pub fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Create a progress bar with an unknown length, hidden when `quiet` is set
#[must_use]
pub fn entry_bar(msg: &str, quiet: bool) -> ProgressBar {
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    pb.set_style(bar_style());
    pb.set_message(msg.to_string());
    pb
}

/// Mirror a library progress update onto a progress bar
pub fn update_bar(pb: &ProgressBar, progress: &VpkProgress) {
    match progress.phase {
        VpkPhase::PackingEntries | VpkPhase::UnpackingEntries => {
            pb.set_length(progress.total as u64);
            pb.set_position(progress.current as u64);
            if let Some(name) = &progress.current_file {
                let short_name = name.rsplit('/').next().unwrap_or(name);
                pb.set_message(short_name.to_string());
            }
        }
        VpkPhase::ReadingManifest | VpkPhase::WritingDirectory => {
            pb.set_message(progress.phase.as_str());
        }
        VpkPhase::Complete => pb.finish_and_clear(),
    }
}

/// Format byte size for human-readable output
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(12), "12 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
