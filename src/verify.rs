//! Consistency check between the input directory and the final output.
//!
//! Only base file names of regular files are compared: this is a
//! completeness check, not a check of file contents.

use crate::error::{PipelineError, PipelineResult};
use crate::io::files::regular_file_names;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Names of regular files in `dir_a` that have no same-named regular file in `dir_b`.
///
/// # Errors
/// `MissingDirectory` if either directory is absent, `Io` if a listing fails.
pub fn reconcile(dir_a: &Path, dir_b: &Path) -> PipelineResult<BTreeSet<String>> {
    let a = names(dir_a)?;
    let b = names(dir_b)?;
    Ok(a.difference(&b).cloned().collect())
}

fn names(dir: &Path) -> PipelineResult<BTreeSet<String>> {
    if !dir.is_dir() {
        return Err(PipelineError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }
    regular_file_names(dir)
        .map_err(|e| PipelineError::io(dir, std::io::Error::other(format!("{e:#}"))))
}

/// Outcome of reconciling both directions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// In the input, absent from the output.
    pub missing: BTreeSet<String>,
    /// In the output, absent from the input.
    pub unexpected: BTreeSet<String>,
}

impl ConsistencyReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }

    /// Turn an inconsistent report into `IncompleteResult`.
    ///
    /// # Errors
    /// `IncompleteResult` when either set is non-empty.
    pub fn into_result(self, output_dir: &Path) -> PipelineResult<()> {
        if self.is_consistent() {
            return Ok(());
        }
        Err(PipelineError::IncompleteResult {
            output_dir: output_dir.to_path_buf(),
            missing: self.missing.into_iter().collect(),
            unexpected: self.unexpected.into_iter().collect(),
        })
    }
}

/// Reconcile `input_dir` against `output_dir` in both directions.
///
/// # Errors
/// As [`reconcile`].
pub fn verify(input_dir: &Path, output_dir: &Path) -> PipelineResult<ConsistencyReport> {
    Ok(ConsistencyReport {
        missing: reconcile(input_dir, output_dir)?,
        unexpected: reconcile(output_dir, input_dir)?,
    })
}

/// Write the zero-byte success marker into `output_dir`.
///
/// # Errors
/// `Io` if the marker cannot be created.
pub fn write_success_marker(output_dir: &Path, marker: &str) -> PipelineResult<PathBuf> {
    let path = output_dir.join(marker);
    File::create(&path).map_err(|e| PipelineError::io(&path, e))?;
    Ok(path)
}
