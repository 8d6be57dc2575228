//! Values handed from one stage to the next.
//!
//! All maps are `BTreeMap`s so that iteration, and therefore everything the
//! writers put on disk, is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Snapshot of a directory: file path → verbatim file text.
pub type DirectoryContents = BTreeMap<PathBuf, String>;

/// Innermost group of map records (bounded by `map_buffer_size`).
pub type RecordChunk = Vec<MapRecord>;

/// Records emitted for one line of a source file, split into chunks.
pub type LineRecords = Vec<RecordChunk>;

/// Mapper result: source file name → lines → chunks → records.
///
/// The orchestrator never looks below the top-level key.
pub type MapperOutput = BTreeMap<String, Vec<LineRecords>>;

/// Shuffler result: source file name → key → counts in emission order.
pub type ShuffledOutput = BTreeMap<String, BTreeMap<String, Vec<u64>>>;

/// Reducer result: source file name → key → aggregated count.
pub type ReducedOutput = BTreeMap<String, BTreeMap<String, u64>>;

/// One unit emitted by the Map phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapRecord {
    pub token: String,
    pub position: u64,
    pub count: u64,
}

impl MapRecord {
    pub fn new(token: impl Into<String>, position: u64, count: u64) -> Self {
        Self {
            token: token.into(),
            position,
            count,
        }
    }
}

/// One line of a shuffle-output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleGroup {
    pub key: String,
    pub counts: Vec<u64>,
}

/// One row of a final-output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCount {
    pub key: String,
    pub count: u64,
}

/// Flatten every record of one source file, preserving emission order.
pub fn flatten_records(lines: &[LineRecords]) -> impl Iterator<Item = &MapRecord> {
    lines.iter().flatten().flatten()
}
