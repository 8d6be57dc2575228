use crate::io::files::{base_name, list_regular_files};
use crate::io::jsonl::read_jsonl_vec;
use crate::stage::{Stage, StageBox, StageContext};
use crate::types::{MapRecord, ShuffledOutput};
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Reads a map-output directory and groups each file's records by token.
///
/// Keys come out sorted; the counts of a key keep the order in which the
/// mapper emitted them.
pub struct KeyShuffler {
    map_dir: PathBuf,
    output: Option<ShuffledOutput>,
}

impl KeyShuffler {
    #[must_use]
    pub fn new(map_dir: PathBuf) -> Self {
        Self {
            map_dir,
            output: None,
        }
    }

    /// Create factory for the shuffler module.
    ///
    /// # Errors
    /// Never fails.
    pub fn create(map_dir: PathBuf, _ctx: &StageContext) -> Result<StageBox<ShuffledOutput>> {
        Ok(Box::new(Self::new(map_dir)))
    }
}

impl Stage for KeyShuffler {
    type Output = ShuffledOutput;

    fn run(&mut self) -> Result<()> {
        let mut output = ShuffledOutput::new();
        for path in list_regular_files(&self.map_dir)? {
            let source = base_name(&path)
                .ok_or_else(|| anyhow!("map output has no file name: {}", path.display()))?;
            let records: Vec<MapRecord> = read_jsonl_vec(&path)?;
            let mut groups: BTreeMap<String, Vec<u64>> = BTreeMap::new();
            for record in records {
                groups.entry(record.token).or_default().push(record.count);
            }
            output.insert(source, groups);
        }
        self.output = Some(output);
        Ok(())
    }

    fn take_output(&mut self) -> Option<ShuffledOutput> {
        self.output.take()
    }
}
