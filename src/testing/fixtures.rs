//! Input directories and configs for tests.

use crate::config::PipelineConfig;
use crate::io::files::regular_file_names;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A small word-count corpus, one `(file name, contents)` pair per file.
///
/// # Example
///
/// ```
/// use dirflow::testing::word_count_files;
///
/// let files = word_count_files();
/// assert_eq!(files.len(), 3);
/// ```
#[must_use]
pub fn word_count_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("alpha.txt", "hello world\nhello rust\n"),
        ("beta.txt", "world of data\nrust programming\n"),
        ("gamma.txt", "hello data world\n"),
    ]
}

/// Fresh temporary directory holding `files`, each written as UTF-8 text.
///
/// # Errors
/// Returns an error if the directory or a file cannot be created.
///
/// # Example
///
/// ```
/// use dirflow::testing::{file_names, write_input_dir};
///
/// # fn main() -> anyhow::Result<()> {
/// let dir = write_input_dir(&[("a.txt", "cat"), ("b.txt", "dog")])?;
/// assert_eq!(file_names(dir.path())?.len(), 2);
/// # Ok(())
/// # }
/// ```
pub fn write_input_dir(files: &[(&str, &str)]) -> Result<TempDir> {
    let dir = tempfile::tempdir().context("create temporary input directory")?;
    for (name, contents) in files {
        let path = dir.path().join(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(dir)
}

/// Base names of the regular files in `dir`.
///
/// # Errors
/// Returns an error if `dir` is not a readable directory.
pub fn file_names(dir: impl AsRef<Path>) -> Result<BTreeSet<String>> {
    regular_file_names(dir)
}

/// Default configuration with every run directory placed under `work_dir`.
#[must_use]
pub fn test_config(work_dir: impl Into<PathBuf>) -> PipelineConfig {
    PipelineConfig::default().with_work_dir(work_dir)
}
