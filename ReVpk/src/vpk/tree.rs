//! Directory tree builder and reader
//!
//! Entries are not stored flat. The tree groups them by extension, then by
//! directory path, then by file name:
//!
//! ```text
//! Extension0
//! |___ Path0
//! |   |___ File0
//! |   |___ File1
//! |___ Path1
//!     |___ File0
//! ...
//! ```
//!
//! A tree scope never holds duplicate elements: an extension is written once,
//! a path once per extension, a file name once per path. Extensions and paths
//! are written in byte order, files in the order they were added.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use indexmap::IndexMap;
use indexmap::map::Entry;

use super::VpkEntryBlock;
use crate::error::{Error, Result};

/// Stand-in for an empty extension or the root directory
const EMPTY_NAME: &str = " ";

type PathContainer<'a> = BTreeMap<String, IndexMap<String, &'a VpkEntryBlock>>;

/// Groups entry blocks into the on-disk directory tree layout
#[derive(Debug, Default)]
pub struct TreeBuilder<'a> {
    file_tree: BTreeMap<String, PathContainer<'a>>,
}

impl<'a> TreeBuilder<'a> {
    /// Group the entry blocks by extension, path and file name
    pub fn build(entry_blocks: &'a [VpkEntryBlock]) -> Result<Self> {
        let mut builder = Self::default();
        for entry_block in entry_blocks {
            builder.insert(entry_block)?;
        }
        Ok(builder)
    }

    fn insert(&mut self, entry_block: &'a VpkEntryBlock) -> Result<()> {
        let (extension, path, name) = split_entry_path(&entry_block.entry_path);

        let files = self
            .file_tree
            .entry(extension)
            .or_default()
            .entry(path)
            .or_default();

        match files.entry(name) {
            Entry::Occupied(_) => Err(Error::DuplicateEntry(entry_block.entry_path.clone())),
            Entry::Vacant(slot) => {
                slot.insert(entry_block);
                Ok(())
            }
        }
    }

    /// Write the grouped tree. Returns the number of descriptors written.
    pub fn write_tree<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut descriptors = 0;

        for (extension, paths) in &self.file_tree {
            write_cstring(writer, extension)?;
            for (path, files) in paths {
                write_cstring(writer, path)?;
                for (name, entry_block) in files {
                    write_cstring(writer, name)?;
                    descriptors += entry_block.write_to(writer)?;
                }
                writer.write_all(&[0])?;
            }
            writer.write_all(&[0])?;
        }
        writer.write_all(&[0])?;

        Ok(descriptors)
    }
}

/// Read every entry block from a grouped tree
pub fn read_tree<R: BufRead>(reader: &mut R) -> Result<Vec<VpkEntryBlock>> {
    let mut entry_blocks = Vec::new();

    loop {
        let extension = read_cstring(reader)?;
        if extension.is_empty() {
            break;
        }
        loop {
            let path = read_cstring(reader)?;
            if path.is_empty() {
                break;
            }
            loop {
                let name = read_cstring(reader)?;
                if name.is_empty() {
                    break;
                }
                let entry_path = join_entry_path(&extension, &path, &name);
                entry_blocks.push(VpkEntryBlock::read_from(reader, entry_path)?);
            }
        }
    }

    Ok(entry_blocks)
}

/// Split an entry path into its (extension, directory, file stem) tree keys
#[must_use]
pub fn split_entry_path(entry_path: &str) -> (String, String, String) {
    let (path, file_name) = match entry_path.rsplit_once('/') {
        Some((path, file_name)) if !path.is_empty() => (path, file_name),
        Some((_, file_name)) => (EMPTY_NAME, file_name),
        None => (EMPTY_NAME, entry_path),
    };

    let (name, extension) = match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => (stem, extension),
        _ => (file_name, EMPTY_NAME),
    };

    (extension.to_string(), path.to_string(), name.to_string())
}

/// Rebuild an entry path from its tree keys
#[must_use]
pub fn join_entry_path(extension: &str, path: &str, name: &str) -> String {
    let mut entry_path = String::new();
    if path != EMPTY_NAME {
        entry_path.push_str(path.trim_end_matches('/'));
        entry_path.push('/');
    }
    entry_path.push_str(name);
    if extension != EMPTY_NAME {
        entry_path.push('.');
        entry_path.push_str(extension);
    }
    entry_path
}

fn write_cstring<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    writer.write_all(value.as_bytes())?;
    writer.write_all(&[0])?;
    Ok(())
}

fn read_cstring<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    reader.read_until(0, &mut bytes)?;

    if bytes.pop() != Some(0) {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }

    String::from_utf8(bytes).map_err(|e| {
        Error::MalformedDirectoryTree(format!(
            "name {:?} is not valid UTF-8",
            String::from_utf8_lossy(e.as_bytes())
        ))
    })
}
