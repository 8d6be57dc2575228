//! JSON Lines (JSONL) I/O utilities.
//!
//! Files are newline-delimited JSON; empty/whitespace-only lines are skipped
//! on read.

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Read a JSONL file into a typed `Vec<T>`.
///
/// Each non-empty line is parsed as a JSON document and deserialized to `T`.
///
/// # Errors
/// Returns an error if the file cannot be opened, read, or if any line fails
/// to parse into `T`. Errors include contextual information (line number).
pub fn read_jsonl_vec<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = BufReader::new(f);
    let mut out = Vec::<T>::new();
    for (i, line) in rdr.lines().enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let v: T = serde_json::from_str(&line).with_context(|| {
            format!("parse JSONL line {} in {}: {}", i + 1, path.display(), line)
        })?;
        out.push(v);
    }
    Ok(out)
}

/// Write items as a JSONL file (one JSON value per line).
///
/// Parent directories are created as needed. An empty iterator produces an
/// empty file.
///
/// # Returns
/// The number of items written.
///
/// # Errors
/// Returns an error if the file/dirs cannot be created or any item fails to
/// serialize/flush.
pub fn write_jsonl_vec<'a, T, I>(path: impl AsRef<Path>, data: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    let mut n = 0usize;
    for item in data {
        serde_json::to_writer(&mut w, item)
            .with_context(|| format!("serialize item #{} to {}", n, path.display()))?;
        w.write_all(b"\n")?;
        n += 1;
    }
    w.flush()?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MapRecord;

    #[test]
    fn skips_blank_lines_and_reports_bad_ones() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let file = tmp.path().join("records");
        std::fs::write(
            &file,
            concat!(
                "{\"token\":\"a\",\"position\":1,\"count\":1}\n",
                "\n   \n",
                "{\"token\":\"b\",\"position\":2,\"count\":1}\n",
            ),
        )?;
        let v: Vec<MapRecord> = read_jsonl_vec(&file)?;
        assert_eq!(v, vec![MapRecord::new("a", 1, 1), MapRecord::new("b", 2, 1)]);

        std::fs::write(&file, "{\"token\":\"a\"}\nnot json\n")?;
        let err = read_jsonl_vec::<MapRecord>(&file).unwrap_err();
        assert!(format!("{err:#}").contains("line 1"));
        Ok(())
    }

    #[test]
    fn empty_input_writes_empty_file() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let file = tmp.path().join("nested").join("empty");
        let n = write_jsonl_vec::<MapRecord, _>(&file, &Vec::new())?;
        assert_eq!(n, 0);
        assert_eq!(std::fs::read_to_string(&file)?, "");
        Ok(())
    }
}
