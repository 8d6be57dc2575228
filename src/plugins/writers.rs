//! The three output writers.
//!
//! Each writer takes a per-source map, creates a fresh directory under the
//! run directory, and writes one file per source named exactly like the
//! source file. Exposed output is the directory path.

use crate::io::csv::write_csv_vec;
use crate::io::files::create_fresh_dir;
use crate::io::jsonl::write_jsonl_vec;
use crate::stage::{Stage, StageBox, StageContext};
use crate::types::{
    KeyCount, LineRecords, MapperOutput, ReducedOutput, ShuffleGroup, ShuffledOutput,
    flatten_records,
};
use anyhow::{Context, Result, anyhow, bail};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MAP_OUTPUT_DIR: &str = "map_output";
pub const SHUFFLE_OUTPUT_DIR: &str = "shuffle_output";
pub const FINAL_OUTPUT_DIR: &str = "final_output";

/// Serializes one source's value to the given file; returns rows written.
pub type WriteFn<T> = fn(&Path, &T) -> Result<usize>;

pub struct DirectoryWriter<T> {
    run_id: String,
    target: PathBuf,
    input: Option<BTreeMap<String, T>>,
    write: WriteFn<T>,
    output: Option<PathBuf>,
}

impl<T> DirectoryWriter<T> {
    /// Writer into `dir_name` under the run directory of `ctx`.
    pub fn new(
        ctx: &StageContext,
        dir_name: &str,
        input: BTreeMap<String, T>,
        write: WriteFn<T>,
    ) -> Self {
        Self {
            run_id: ctx.run_id().to_string(),
            target: ctx.run_dir().join(dir_name),
            input: Some(input),
            write,
            output: None,
        }
    }
}

impl<T> Stage for DirectoryWriter<T> {
    type Output = PathBuf;

    fn run(&mut self) -> Result<()> {
        let input = self
            .input
            .take()
            .ok_or_else(|| anyhow!("writer input already consumed"))?;
        let dir = create_fresh_dir(&self.target)?;
        for (source, value) in &input {
            let name = Path::new(source);
            if name.file_name() != Some(name.as_os_str()) {
                bail!("refusing to write output for {source:?}: not a plain file name");
            }
            let path = dir.join(name);
            let rows = (self.write)(&path, value)
                .with_context(|| format!("write {}", path.display()))?;
            debug!(path = %path.display(), rows, "output file written");
        }
        debug!(
            run_id = %self.run_id,
            dir = %dir.display(),
            files = input.len(),
            "directory written"
        );
        self.output = Some(dir);
        Ok(())
    }

    fn take_output(&mut self) -> Option<PathBuf> {
        self.output.take()
    }
}

fn write_map_records(path: &Path, lines: &Vec<LineRecords>) -> Result<usize> {
    write_jsonl_vec(path, flatten_records(lines))
}

fn write_shuffle_groups(path: &Path, groups: &BTreeMap<String, Vec<u64>>) -> Result<usize> {
    let rows: Vec<ShuffleGroup> = groups
        .iter()
        .map(|(key, counts)| ShuffleGroup {
            key: key.clone(),
            counts: counts.clone(),
        })
        .collect();
    write_jsonl_vec(path, &rows)
}

fn write_key_counts(path: &Path, totals: &BTreeMap<String, u64>) -> Result<usize> {
    if totals.is_empty() {
        // serde-driven headers only appear with the first row
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["key", "count"])?;
        wtr.flush()?;
        return Ok(0);
    }
    let rows: Vec<KeyCount> = totals
        .iter()
        .map(|(key, count)| KeyCount {
            key: key.clone(),
            count: *count,
        })
        .collect();
    write_csv_vec(path, true, &rows)
}

/// Create factory for the map-output writer module.
///
/// # Errors
/// Never fails.
pub fn create_map_writer(input: MapperOutput, ctx: &StageContext) -> Result<StageBox<PathBuf>> {
    Ok(Box::new(DirectoryWriter::new(ctx, MAP_OUTPUT_DIR, input, write_map_records)))
}

/// Create factory for the shuffle-output writer module.
///
/// # Errors
/// Never fails.
pub fn create_shuffle_writer(
    input: ShuffledOutput,
    ctx: &StageContext,
) -> Result<StageBox<PathBuf>> {
    Ok(Box::new(DirectoryWriter::new(ctx, SHUFFLE_OUTPUT_DIR, input, write_shuffle_groups)))
}

/// Create factory for the final-output writer module.
///
/// # Errors
/// Never fails.
pub fn create_final_writer(input: ReducedOutput, ctx: &StageContext) -> Result<StageBox<PathBuf>> {
    Ok(Box::new(DirectoryWriter::new(ctx, FINAL_OUTPUT_DIR, input, write_key_counts)))
}
