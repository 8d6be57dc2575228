//! Directory listing for the stages and the verifier.
//!
//! Listing reads the directory entries directly. Results are sorted for
//! deterministic processing order and never include subdirectories. Every
//! listed name must be valid UTF-8: a name that is not fails the listing
//! instead of being skipped, so no input file can go unprocessed unnoticed.

use anyhow::{Context, Result, anyhow, bail};
use std::collections::BTreeSet;
use std::fs::{create_dir_all, read_dir};
use std::path::{Path, PathBuf};

/// Regular files directly inside `dir`, sorted by path.
///
/// Symlinks are followed, so a link to a regular file counts as one.
///
/// # Errors
/// Returns an error if `dir` is not a directory, an entry cannot be read, or
/// an entry name is not valid UTF-8.
pub fn list_regular_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }
    let entries = read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;

    let mut result = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("reading an entry of {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Err(name) = entry.file_name().into_string() {
            bail!(
                "file name is not valid UTF-8: {:?} in {}",
                name,
                dir.display()
            );
        }
        result.push(path);
    }
    result.sort();
    Ok(result)
}

/// Base file names of the regular files directly inside `dir`.
///
/// # Errors
/// As [`list_regular_files`].
pub fn regular_file_names(dir: impl AsRef<Path>) -> Result<BTreeSet<String>> {
    list_regular_files(dir)?
        .iter()
        .map(|p| base_name(p).ok_or_else(|| anyhow!("no UTF-8 file name: {}", p.display())))
        .collect()
}

/// Final path component as UTF-8 text, `None` if absent or not UTF-8.
#[must_use]
pub fn base_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
}

/// Create `dir` (and parents), refusing to reuse an existing path.
///
/// # Errors
/// Returns an error if `dir` already exists or cannot be created.
pub fn create_fresh_dir(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    if dir.exists() {
        bail!("output directory already exists: {}", dir.display());
    }
    create_dir_all(dir).with_context(|| format!("mkdir -p {}", dir.display()))?;
    Ok(dir.to_path_buf())
}
