//! Path utilities

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Normalize path separators to forward slashes (for VPK entries)
pub fn normalize_path<P: AsRef<Path>>(path: P) -> String {
    path.as_ref().to_string_lossy().replace('\\', "/")
}

/// Get relative path and normalize separators
pub fn relative_path<P: AsRef<Path>>(path: P, base: P) -> Option<String> {
    path.as_ref()
        .strip_prefix(base.as_ref())
        .ok()
        .map(normalize_path)
}

/// Normalize an entry path and reject anything that could escape the
/// workspace or cannot be stored in a directory tree.
pub fn sanitize_entry_path(entry_path: &str) -> Result<String> {
    let normalized = entry_path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/');

    if trimmed.is_empty() || trimmed.ends_with('/') {
        return Err(Error::InvalidEntryPath(entry_path.to_string()));
    }

    for component in Path::new(trimmed).components() {
        if !matches!(component, Component::Normal(_)) {
            return Err(Error::InvalidEntryPath(entry_path.to_string()));
        }
    }

    // NUL terminates every name in the tree
    if trimmed.contains('\0')
        || trimmed
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(Error::InvalidEntryPath(entry_path.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Join a sanitized entry path onto an output root
pub fn entry_output_path(root: &Path, entry_path: &str) -> Result<PathBuf> {
    let sanitized = sanitize_entry_path(entry_path)?;
    Ok(sanitized.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part)))
}
