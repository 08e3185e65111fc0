//! CLI command for generating a build manifest

use std::path::Path;

use crate::vpk::{IgnoreList, Manifest};

pub fn execute(workspace: &Path, name: &str, force: bool) -> anyhow::Result<()> {
    let path = Manifest::path_for(workspace, name);
    if path.exists() && !force {
        anyhow::bail!(
            "Manifest '{}' already exists (use --force to overwrite)",
            path.display()
        );
    }

    let ignore = IgnoreList::load(workspace);
    let manifest = Manifest::scan_workspace(workspace, &ignore)?;
    let path = manifest.save(workspace, name)?;

    println!("Wrote {} entries to {}", manifest.len(), path.display());
    Ok(())
}
