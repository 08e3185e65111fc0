//! Build manifests and the workspace ignore list
//!
//! A build manifest lists every workspace file that goes into a VPK along
//! with its per-entry settings. Manifests live next to the workspace as
//! `manifest/<base name>.json`:
//!
//! ```json
//! {
//!   "scripts/vscripts/weapons.nut": {
//!     "preloadSize": 0,
//!     "loadFlags": 257,
//!     "textureFlags": 8,
//!     "useCompression": true,
//!     "deDuplicate": true
//!   }
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{IGNORE_FILE, MANIFEST_DIR, VpkEntryBlock, load_flags, texture_flags};
use crate::error::{Error, Result};
use crate::utils::{entry_output_path, relative_path, sanitize_entry_path};

const fn default_load_flags() -> u32 {
    load_flags::DEFAULT
}

const fn default_texture_flags() -> u16 {
    texture_flags::DEFAULT
}

const fn default_true() -> bool {
    true
}

/// Per-entry build settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(default)]
    pub preload_size: u16,
    #[serde(default = "default_load_flags")]
    pub load_flags: u32,
    #[serde(default = "default_texture_flags")]
    pub texture_flags: u16,
    #[serde(default = "default_true")]
    pub use_compression: bool,
    #[serde(default = "default_true", rename = "deDuplicate")]
    pub deduplicate: bool,
}

impl Default for ManifestEntry {
    fn default() -> Self {
        Self {
            preload_size: 0,
            load_flags: load_flags::DEFAULT,
            texture_flags: texture_flags::DEFAULT,
            use_compression: true,
            deduplicate: true,
        }
    }
}

/// A manifest entry resolved against a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    /// Path stored in the directory tree
    pub entry_path: String,
    /// File the entry is read from
    pub source: PathBuf,
    pub settings: ManifestEntry,
}

/// Ordered map from entry path to build settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: IndexMap<String, ManifestEntry>,
}

impl Manifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Manifest file path for the VPK with the given base name
    #[must_use]
    pub fn path_for(workspace: &Path, base_name: &str) -> PathBuf {
        workspace.join(MANIFEST_DIR).join(format!("{base_name}.json"))
    }

    /// Load the manifest for the VPK with the given base name
    ///
    /// # Errors
    /// Returns [`Error::ManifestNotFound`] if there is no manifest, or an
    /// error if it cannot be read or parsed.
    pub fn load(workspace: &Path, base_name: &str) -> Result<Self> {
        let path = Self::path_for(workspace, base_name);
        if !path.is_file() {
            return Err(Error::ManifestNotFound(path));
        }

        let content = fs::read_to_string(&path)?;
        let manifest: Self = serde_json::from_str(&content)?;
        tracing::info!("Loaded manifest '{}' with {} entries", path.display(), manifest.len());
        Ok(manifest)
    }

    /// Write the manifest for the VPK with the given base name, returning its path
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, workspace: &Path, base_name: &str) -> Result<PathBuf> {
        let path = Self::path_for(workspace, base_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        tracing::info!("Wrote manifest '{}' with {} entries", path.display(), self.len());
        Ok(path)
    }

    pub fn insert(&mut self, entry_path: impl Into<String>, settings: ManifestEntry) {
        self.entries.insert(entry_path.into(), settings);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry against the workspace, dropping the ones that
    /// cannot be packed. Names that normalize to an entry path already taken
    /// by an earlier entry are dropped too.
    #[must_use]
    pub fn resolve(&self, workspace: &Path, ignore: &IgnoreList) -> Vec<ResolvedEntry> {
        let mut resolved = Vec::with_capacity(self.entries.len());
        let mut seen = HashSet::with_capacity(self.entries.len());

        for (name, settings) in &self.entries {
            if name.trim().is_empty() {
                tracing::warn!("File in build manifest has no name");
                continue;
            }

            let entry_path = match sanitize_entry_path(name) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Skipping '{name}': {e}");
                    continue;
                }
            };

            if !seen.insert(entry_path.clone()) {
                tracing::warn!("Skipping '{name}': same entry path as an earlier entry ('{entry_path}')");
                continue;
            }

            if ignore.matches(&entry_path) {
                tracing::warn!("Skipping '{entry_path}': matched by {IGNORE_FILE}");
                continue;
            }

            let source = match entry_output_path(workspace, &entry_path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Skipping '{entry_path}': {e}");
                    continue;
                }
            };

            if !source.is_file() || fs::File::open(&source).is_err() {
                tracing::warn!(
                    "File '{}' listed in build manifest couldn't be opened",
                    source.display()
                );
                continue;
            }

            resolved.push(ResolvedEntry {
                entry_path,
                source,
                settings: *settings,
            });
        }

        resolved
    }

    /// Describe already packed entries, so an unpacked workspace can be
    /// rebuilt with the same settings
    #[must_use]
    pub fn from_entry_blocks(entry_blocks: &[VpkEntryBlock]) -> Self {
        let entries = entry_blocks
            .iter()
            .map(|block| {
                let settings = match block.fragments.first() {
                    Some(first) => ManifestEntry {
                        preload_size: block.preload_size,
                        load_flags: first.load_flags,
                        texture_flags: first.texture_flags,
                        use_compression: first.is_compressed(),
                        deduplicate: true,
                    },
                    None => ManifestEntry {
                        preload_size: block.preload_size,
                        ..ManifestEntry::default()
                    },
                };
                (block.entry_path.clone(), settings)
            })
            .collect();

        Self { entries }
    }

    /// Build a default manifest listing every file under `workspace`.
    ///
    /// The manifest directory, the ignore file and ignored paths are skipped.
    ///
    /// # Errors
    /// Returns [`Error::WalkDir`] if directory traversal fails.
    pub fn scan_workspace(workspace: &Path, ignore: &IgnoreList) -> Result<Self> {
        let mut manifest = Self::new();

        let walker = WalkDir::new(workspace)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && e.file_name() == MANIFEST_DIR));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(entry_path) = relative_path(entry.path(), workspace) else {
                continue;
            };

            if entry_path == IGNORE_FILE || ignore.matches(&entry_path) {
                tracing::debug!("Skipping '{entry_path}'");
                continue;
            }

            manifest.insert(entry_path, ManifestEntry::default());
        }

        tracing::info!(
            "Scanned '{}': {} entries",
            workspace.display(),
            manifest.len()
        );
        Ok(manifest)
    }
}

/// Patterns from a workspace's `.vpkignore`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    patterns: Vec<String>,
}

impl IgnoreList {
    /// Load `<workspace>/.vpkignore`. A missing file yields an empty list.
    #[must_use]
    pub fn load(workspace: &Path) -> Self {
        let path = workspace.join(IGNORE_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => {
                tracing::warn!("No ignore file provided; continuing build without...");
                Self::default()
            }
        }
    }

    /// Parse ignore file contents. Lines containing `//` are comments.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let patterns = content
            .lines()
            .filter(|line| !line.contains("//"))
            .map(|line| line.trim_end_matches(['\r', '\n']).trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.replace('\\', "/").to_ascii_lowercase())
            .collect();

        Self { patterns }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a workspace-relative entry path is ignored
    #[must_use]
    pub fn matches(&self, entry_path: &str) -> bool {
        let path = entry_path.replace('\\', "/").to_ascii_lowercase();
        let file_name = path.rsplit('/').next().unwrap_or(&path);

        self.patterns.iter().any(|pattern| {
            if *pattern == path {
                return true;
            }
            if pattern.ends_with('/') {
                return path.starts_with(pattern.as_str());
            }

            let extension = pattern
                .strip_prefix("*.")
                .or_else(|| pattern.strip_prefix('.'));
            extension.is_some_and(|ext| {
                file_name
                    .rsplit_once('.')
                    .is_some_and(|(stem, file_ext)| !stem.is_empty() && file_ext == ext)
            })
        })
    }
}
