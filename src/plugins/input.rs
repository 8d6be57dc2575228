use crate::io::files::list_regular_files;
use crate::stage::{Stage, StageBox, StageContext};
use crate::types::DirectoryContents;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

/// Reads every regular file of a directory into memory as UTF-8 text.
pub struct DirectoryReader {
    dir: PathBuf,
    output: Option<DirectoryContents>,
}

impl DirectoryReader {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, output: None }
    }

    /// Create factory for the input reader module.
    ///
    /// # Errors
    /// Never fails; the directory is only touched by `run`.
    pub fn create(dir: PathBuf, _ctx: &StageContext) -> Result<StageBox<DirectoryContents>> {
        Ok(Box::new(Self::new(dir)))
    }
}

impl Stage for DirectoryReader {
    type Output = DirectoryContents;

    fn run(&mut self) -> Result<()> {
        let mut contents = DirectoryContents::new();
        for path in list_regular_files(&self.dir)? {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            debug!(path = %path.display(), bytes = text.len(), "input file read");
            contents.insert(path, text);
        }
        self.output = Some(contents);
        Ok(())
    }

    fn take_output(&mut self) -> Option<DirectoryContents> {
        self.output.take()
    }
}
