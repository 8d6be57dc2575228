use crate::io::files::{base_name, list_regular_files};
use crate::io::jsonl::read_jsonl_vec;
use crate::stage::{Stage, StageBox, StageContext};
use crate::types::{ReducedOutput, ShuffleGroup};
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Reads a shuffle-output directory and sums the counts of every key.
pub struct SumReducer {
    shuffle_dir: PathBuf,
    output: Option<ReducedOutput>,
}

impl SumReducer {
    #[must_use]
    pub fn new(shuffle_dir: PathBuf) -> Self {
        Self {
            shuffle_dir,
            output: None,
        }
    }

    /// Create factory for the reducer module.
    ///
    /// # Errors
    /// Never fails.
    pub fn create(shuffle_dir: PathBuf, _ctx: &StageContext) -> Result<StageBox<ReducedOutput>> {
        Ok(Box::new(Self::new(shuffle_dir)))
    }
}

impl Stage for SumReducer {
    type Output = ReducedOutput;

    fn run(&mut self) -> Result<()> {
        let mut output = ReducedOutput::new();
        for path in list_regular_files(&self.shuffle_dir)? {
            let source = base_name(&path)
                .ok_or_else(|| anyhow!("shuffle output has no file name: {}", path.display()))?;
            let groups: Vec<ShuffleGroup> = read_jsonl_vec(&path)?;
            let mut totals: BTreeMap<String, u64> = BTreeMap::new();
            for group in groups {
                *totals.entry(group.key).or_insert(0) += group.counts.iter().sum::<u64>();
            }
            output.insert(source, totals);
        }
        self.output = Some(output);
        Ok(())
    }

    fn take_output(&mut self) -> Option<ReducedOutput> {
        self.output.take()
    }
}
