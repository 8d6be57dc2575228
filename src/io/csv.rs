//! CSV I/O utilities.
//!
//! All typed I/O is Serde-backed (`DeserializeOwned`/`Serialize`); headers
//! are derived from the field names of `T`.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{File, create_dir_all};
use std::path::Path;

/// Read a CSV file into a typed `Vec<T>`.
///
/// * If `has_headers` is `true`, the first row is treated as a header and
///   not deserialized into `T`.
/// * Errors are annotated with row numbers for easier debugging.
///
/// # Errors
/// Returns an error if the file cannot be opened or if any row fails to
/// deserialize into `T`.
pub fn read_csv_vec<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    has_headers: bool,
) -> Result<Vec<T>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .from_reader(f);
    let mut out = Vec::<T>::new();
    for (i, rec) in rdr.deserialize::<T>().enumerate() {
        let v = rec.with_context(|| format!("parse CSV record #{} in {}", i + 1, path.display()))?;
        out.push(v);
    }
    Ok(out)
}

/// Write a typed slice to a CSV file.
///
/// * Creates parent directories if they don't exist.
/// * Emits a header row when `has_headers` is `true`. With no rows the file
///   is created empty.
///
/// # Returns
/// The number of rows written (i.e., `data.len()`).
///
/// # Errors
/// Returns an error if the file/dirs cannot be created or any row fails to
/// serialize/flush.
pub fn write_csv_vec<T: Serialize>(
    path: impl AsRef<Path>,
    has_headers: bool,
    data: &[T],
) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut wtr = WriterBuilder::new()
        .has_headers(has_headers)
        .from_writer(f);
    for (i, row) in data.iter().enumerate() {
        wtr.serialize(row)
            .with_context(|| format!("serialize CSV row #{}", i + 1))?;
    }
    wtr.flush()?;
    Ok(data.len())
}
